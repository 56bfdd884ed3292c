//! Routing between two handlers on a per-request flag.

use super::Handler;

/// Send requests with the `synchronous` option to `sync`, everything else
/// to `default`.
pub fn wrap_sync(default: Handler, sync: Handler) -> Handler {
    Handler::new(move |request, options| {
        if options.synchronous() {
            sync.call(request, options)
        } else {
            default.call(request, options)
        }
    })
    .named("wrap_sync")
}

/// Send requests with the `stream` option to `streaming`, everything else
/// to `default`.
pub fn wrap_streaming(default: Handler, streaming: Handler) -> Handler {
    Handler::new(move |request, options| {
        if options.stream() {
            streaming.call(request, options)
        } else {
            default.call(request, options)
        }
    })
    .named("wrap_streaming")
}
