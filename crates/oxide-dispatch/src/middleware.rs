//! Built-in middleware.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use tracing::{error, info};

use crate::context::RequestContext;
use crate::error::Halt;
use crate::executor::Handler;

/// Logs one line per request once the rest of the chain has run.
///
/// The line carries the method, the request URI, the final status, the
/// latency and the client address.
#[must_use]
pub fn logger<C: RequestContext>() -> Handler<C> {
    Handler::named("logger", |ctx: &mut C| {
        let start = Instant::now();
        let method = ctx.request().method.clone();
        let uri = ctx.request().uri();

        let result = ctx.next();

        info!(
            method = %method,
            path = %uri,
            status = ctx.writer().status(),
            latency = ?start.elapsed(),
            client_ip = %ctx.client_ip(),
            "Request served"
        );
        result
    })
}

/// Turns panics and faults in the rest of the chain into a 500 response.
///
/// A [`Halt::Die`] from below is absorbed too, so the handlers before this
/// one finish normally.
#[must_use]
pub fn recovery<C: RequestContext>() -> Handler<C> {
    Handler::named("recovery", |ctx: &mut C| {
        match panic::catch_unwind(AssertUnwindSafe(|| ctx.next())) {
            Ok(Ok(()) | Err(Halt::Die)) => {}
            Ok(Err(Halt::Fault(reason))) => {
                error!(path = %ctx.request().path, "Handler fault: {reason}");
                ctx.abort_with_status(500);
            }
            Err(payload) => {
                error!(
                    path = %ctx.request().path,
                    "Panic recovered: {}",
                    panic_message(payload.as_ref())
                );
                ctx.abort_with_status(500);
            }
        }
        Ok(())
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::executor::{handler, Executor, HandlersChain};
    use crate::request::Request;

    fn run(chain: Vec<Handler<Context>>) -> Context {
        let mut ctx = Context::default();
        ctx.init(Request::get("/boom"));
        let chain: HandlersChain<Context> = chain.into();
        *ctx.executor_mut() = Executor::new(chain);
        assert_eq!(ctx.next(), Ok(()));
        ctx
    }

    #[test]
    fn test_recovery_catches_panic() {
        let ctx = run(vec![
            recovery(),
            handler(|_: &mut Context| panic!("handler exploded")),
        ]);
        assert_eq!(ctx.writer().status(), 500);
        assert!(ctx.writer().written());
        assert!(ctx.is_aborted());
    }

    #[test]
    fn test_recovery_converts_fault() {
        let ctx = run(vec![
            recovery(),
            handler(|_: &mut Context| Err(Halt::fault("database unavailable"))),
        ]);
        assert_eq!(ctx.writer().status(), 500);
        assert!(ctx.is_aborted());
    }

    #[test]
    fn test_recovery_absorbs_die() {
        let ctx = run(vec![
            recovery(),
            handler(|c: &mut Context| c.die_with_status(401)),
        ]);
        assert_eq!(ctx.writer().status(), 401);
    }

    #[test]
    fn test_logger_passes_through() {
        let ctx = run(vec![
            logger(),
            handler(|c: &mut Context| {
                c.string(202, "accepted");
                Ok(())
            }),
        ]);
        assert_eq!(ctx.writer().status(), 202);
        assert_eq!(ctx.writer().body(), b"accepted");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
