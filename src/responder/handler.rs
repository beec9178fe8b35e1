use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Type-erased async handler function.
///
/// Handlers take the request's decoded `params` value and return the
/// serialized response payload to publish.
///
/// Wrapped in Arc for cheap cloning when spawning tasks.
pub(super) type BoxedHandler =
    Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<Bytes>> + Send>> + Send + Sync>;

/// Wrap a typed handler function into a type-erased handler.
///
/// This allows the responder to store handlers of different types in the
/// same HashMap.
pub(super) fn wrap_handler<F, Fut, P, R>(handler: F) -> BoxedHandler
where
    F: Fn(P) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
{
    // ---
    Arc::new(move |params: Value| {
        let handler = handler.clone();
        let fut = Box::pin(async move {
            // ---
            // Decode the params into the handler's input type
            let params: P = serde_json::from_value(params).map_err(Error::Decode)?;

            // Execute typed handler
            let result: R = handler(params).await?;

            // Serialize the response payload
            let payload = serde_json::to_vec(&result).map_err(Error::Encode)?;

            Ok(Bytes::from(payload))
        });

        fut as Pin<Box<dyn Future<Output = Result<Bytes>> + Send>>
    })
}
