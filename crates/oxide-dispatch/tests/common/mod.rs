//! Shared helpers for dispatch tests.

#![allow(dead_code)]

use oxide_dispatch::{
    handler, Context, Engine, EngineConfig, Handler, Request, RequestContext, Response,
};

/// A route handler answering 200 with a fixed body.
pub fn text(body: &'static str) -> Handler<Context> {
    handler(move |c: &mut Context| {
        c.string(200, body);
        Ok(())
    })
}

/// A route handler answering with the matched pattern and its parameters,
/// e.g. `/users/:id id=42`.
pub fn describe() -> Handler<Context> {
    handler(|c: &mut Context| {
        let mut body = c.full_path().to_string();
        for (key, value) in c.params().iter() {
            body.push_str(&format!(" {key}={value}"));
        }
        c.string(200, &body);
        Ok(())
    })
}

/// A middleware recording `name` before and after the rest of the chain.
pub fn wrap(name: &'static str) -> Handler<Context> {
    handler(move |c: &mut Context| {
        record(c, &format!("{name}-in"));
        c.next()?;
        record(c, &format!("{name}-out"));
        Ok(())
    })
}

/// A route handler recording `name`.
pub fn finish(name: &'static str) -> Handler<Context> {
    handler(move |c: &mut Context| {
        record(c, name);
        Ok(())
    })
}

/// Appends a step to the `trace` metadata entry.
pub fn record(c: &Context, step: &str) {
    let mut steps = c.get_as::<Vec<String>>("trace").unwrap_or_default();
    steps.push(step.to_string());
    c.set("trace", steps);
}

/// An outermost middleware writing the recorded steps, comma separated, as
/// the body once everything below it has run.
pub fn expose_trace() -> Handler<Context> {
    handler(|c: &mut Context| {
        let result = c.next();
        let steps = c.get_as::<Vec<String>>("trace").unwrap_or_default();
        c.string(200, &steps.join(","));
        result
    })
}

/// Builds an engine with the given configuration.
pub fn engine_with(config: EngineConfig) -> Engine {
    Engine::with_config(config).expect("valid config")
}

/// Sends a request with the given method.
pub fn send(engine: &Engine, method: &str, target: &str) -> Response {
    engine.serve(Request::new(method, target))
}

/// Sends a GET request.
pub fn get(engine: &Engine, target: &str) -> Response {
    send(engine, "GET", target)
}

/// Returns the body of a response as a string.
pub fn body(response: &Response) -> String {
    response.body_string().unwrap_or_default()
}
