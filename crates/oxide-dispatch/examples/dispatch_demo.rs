//! Example: A Small JSON API
//!
//! This example builds an engine with the default middleware, a versioned
//! route group guarded by a token check, and serves a handful of in-memory
//! requests through it.
//!
//! Run with: cargo run --example dispatch_demo -p oxide-dispatch

use oxide_dispatch::{
    handlers, Context, Engine, EngineConfig, HandlerResult, Request, RequestContext, Routes,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

// =============================================================================
// Handlers
// =============================================================================

fn require_token(c: &mut Context) -> HandlerResult {
    let authorized = c.get_header("Authorization") == Some("Bearer demo");
    if !authorized {
        return c.die_with_status(401);
    }
    c.set("user", "demo");
    c.next()
}

fn show_user(c: &mut Context) -> HandlerResult {
    let id = c.param("id").to_string();
    let caller = c.get_string("user");
    c.json(200, &serde_json::json!({ "id": id, "requested_by": caller }))
}

fn serve_asset(c: &mut Context) -> HandlerResult {
    let file = c.param("filepath").to_string();
    c.string(200, &format!("contents of {file}"));
    Ok(())
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = EngineConfig::from_json(
        r#"{"handle_method_not_allowed": true, "redirect_fixed_path": true}"#,
    )?;
    let mut engine = Engine::with_config(config)?;
    engine.use_middleware(vec![oxide_dispatch::logger(), oxide_dispatch::recovery()]);

    engine.get("/assets/*filepath", handlers![serve_asset]);
    engine
        .group("/api/v1", handlers![require_token])
        .get("/users/:id", handlers![show_user]);

    let requests = [
        Request::get("/api/v1/users/7").header("Authorization", "Bearer demo"),
        Request::get("/api/v1/users/7"),
        Request::get("/API/v1/users/7/"),
        Request::post("/assets/app.css"),
        Request::get("/assets/css/site.css?v=3"),
        Request::get("/nowhere"),
    ];

    for request in requests {
        let target = request.uri();
        let response = engine.serve(request);
        info!(
            uri = %target,
            status = response.status,
            location = response.get_header("Location").unwrap_or(""),
            body = %response.body_string().unwrap_or_default(),
            "Response"
        );
    }

    Ok(())
}
