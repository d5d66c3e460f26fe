//! Tests for route groups and route introspection.

mod common;

use common::*;
use oxide_dispatch::{handler, Context, Engine, Handler, Method, RouterError, Routes};

#[test]
fn group_prefixes_routes() {
    let mut engine = Engine::new();
    {
        let mut api = engine.group("/api", Vec::new());
        api.get("/users", vec![describe()]);
        api.get("users/:id", vec![describe()]);

        let mut v2 = api.group("v2/", Vec::new());
        v2.get("/items/", vec![describe()]);
        assert_eq!(v2.base_path(), "/api/v2/");
    }

    assert_eq!(body(&get(&engine, "/api/users")), "/api/users");
    assert_eq!(body(&get(&engine, "/api/users/5")), "/api/users/:id id=5");
    assert_eq!(body(&get(&engine, "/api/v2/items/")), "/api/v2/items/");
    assert_eq!(get(&engine, "/users").status, 404);
}

#[test]
fn group_root_route_keeps_prefix() {
    let mut engine = Engine::new();
    engine.group("/admin", Vec::new()).get("", vec![text("dashboard")]);

    assert_eq!(body(&get(&engine, "/admin")), "dashboard");
}

#[test]
fn group_middleware_runs_between_global_and_route() {
    let mut engine = Engine::new();
    engine.use_middleware(vec![expose_trace(), wrap("global")]);
    {
        let mut api = engine.group("/api", vec![wrap("api")]);
        api.use_middleware(vec![wrap("late")]);
        api.get("/ping", vec![finish("ping")]);
    }
    engine.get("/health", vec![finish("health")]);

    assert_eq!(
        body(&get(&engine, "/api/ping")),
        "global-in,api-in,late-in,ping,late-out,api-out,global-out"
    );
    assert_eq!(body(&get(&engine, "/health")), "global-in,health,global-out");
}

#[test]
fn middleware_added_later_does_not_reach_earlier_routes() {
    let mut engine = Engine::new();
    engine.use_middleware(vec![expose_trace()]);
    engine.get("/early", vec![finish("early")]);
    engine.use_middleware(vec![wrap("late")]);
    engine.get("/after", vec![finish("after")]);

    assert_eq!(body(&get(&engine, "/early")), "early");
    assert_eq!(body(&get(&engine, "/after")), "late-in,after,late-out");
}

#[test]
fn any_registers_every_method() {
    let mut engine = Engine::new();
    engine.any("/echo", vec![text("echo")]);

    for method in Method::ALL {
        let response = send(&engine, method.as_str(), "/echo");
        assert_eq!(response.status, 200, "{method}");
    }
    assert_eq!(engine.routes().len(), Method::ALL.len());
}

#[test]
fn match_methods_registers_listed_methods() {
    let mut engine = Engine::new();
    engine.match_methods(&["GET", "POST", "PROPFIND"], "/dav", vec![text("dav")]);

    assert_eq!(send(&engine, "PROPFIND", "/dav").status, 200);
    assert_eq!(send(&engine, "POST", "/dav").status, 200);
    assert_eq!(send(&engine, "PUT", "/dav").status, 404);
}

#[test]
fn routes_lists_registrations() {
    let mut engine = Engine::new();
    engine.use_middleware(vec![Handler::named("logger", |c: &mut Context| {
        oxide_dispatch::RequestContext::next(c)
    })]);
    engine.get("/users", vec![Handler::named("list_users", |_: &mut Context| Ok(()))]);
    engine
        .group("/users", Vec::new())
        .post("", vec![Handler::named("create_user", |_: &mut Context| Ok(()))])
        .delete("/:id", vec![Handler::named("delete_user", |_: &mut Context| Ok(()))]);

    let mut routes: Vec<(String, String, &str)> = engine
        .routes()
        .into_iter()
        .map(|r| (r.method, r.path, r.handler))
        .collect();
    routes.sort();

    assert_eq!(
        routes,
        vec![
            ("DELETE".to_string(), "/users/:id".to_string(), "delete_user"),
            ("GET".to_string(), "/users".to_string(), "list_users"),
            ("POST".to_string(), "/users".to_string(), "create_user"),
        ]
    );
}

#[test]
fn group_rejects_duplicates_without_panicking() {
    let mut engine = Engine::new();
    let mut api = engine.group("/api", Vec::new());
    api.get("/a", vec![text("a")]);

    let err = api.try_handle("GET", "a", vec![text("again")]).unwrap_err();
    assert!(matches!(err, RouterError::Pattern(_)));
    assert_eq!(err.to_string(), "handlers are already registered for path '/api/a'");
}

#[test]
fn group_rejects_conflicting_wildcards() {
    let mut engine = Engine::new();
    let mut api = engine.group("/files", Vec::new());
    api.get("/:name", vec![text("file")]);

    assert!(api.try_handle("GET", "/:other", vec![text("other")]).is_err());
}

#[test]
fn nested_group_middleware_is_capped() {
    let mut engine = Engine::new();
    let noop = || handler(|_: &mut Context| Ok(()));
    let mut outer = engine.group("/a", (0..40).map(|_| noop()).collect());

    let err = outer
        .try_group("/b", (0..30).map(|_| noop()).collect())
        .unwrap_err();
    assert!(matches!(err, RouterError::ChainTooLong { len: 70, .. }));
}

#[test]
fn group_middleware_is_capped() {
    let mut engine = Engine::new();
    let noop = || handler(|_: &mut Context| Ok(()));
    let mut api = engine.group("/api", (0..60).map(|_| noop()).collect());

    let err = api
        .try_use_middleware((0..3).map(|_| noop()).collect())
        .unwrap_err();
    assert!(matches!(err, RouterError::ChainTooLong { len: 63, .. }));
    assert_eq!(api.handlers().len(), 60);
}
