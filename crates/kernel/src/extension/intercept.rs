//! Interception: run an operation between `<point>-start` and `<point>-end`.
//!
//! ```ignore
//! let config = intercept(
//!     &dispatcher,
//!     extension_point!("load_config"),
//!     Some(&agent),
//!     CallArgs::new().arg(plugin),
//!     |call| async move { service.load_config(call.str_arg(0).unwrap_or_default(), ..) },
//! )
//! .await?;
//! ```

use std::future::Future;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::dispatcher::{ExtensionDispatcher, validate_point};
use super::exchange::{CallArgs, ExchangeRecord, ExtensionData};
use crate::agent::Agent;

/// Fully qualified extension point name for the calling module.
///
/// `extension_point!("load_config")` inside `plexus_kernel::state` yields
/// `"plexus_kernel::state.load_config"`.
#[macro_export]
macro_rules! extension_point {
    ($name:literal) => {
        concat!(module_path!(), ".", $name)
    };
}

/// Suffix of the point fired before the call.
pub const START_SUFFIX: &str = "-start";
/// Suffix of the point fired after the call.
pub const END_SUFFIX: &str = "-end";

/// Call `op` wrapped by the `-start` and `-end` points of `point`.
///
/// When no extension touches the result, the value `op` returned is handed
/// back as is. A result replaced by an extension is deserialized into `R`;
/// an unset result deserializes from `null`. A value that has no JSON form
/// leaves the result slot unset for the `-end` extensions.
///
/// A point name that cannot address an extension directory calls `op`
/// directly.
pub async fn intercept<R, F, Fut>(
    dispatcher: &ExtensionDispatcher,
    point: &str,
    agent: Option<&Agent>,
    args: CallArgs,
    op: F,
) -> Result<R>
where
    R: Serialize + DeserializeOwned,
    F: FnOnce(CallArgs) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    if !can_intercept(point) {
        return op(args).await;
    }

    let start = format!("{point}{START_SUFFIX}");
    let end = format!("{point}{END_SUFFIX}");

    let mut data = ExtensionData::with_exchange(ExchangeRecord::new(args));
    dispatcher.call_extensions(&start, agent, &mut data).await?;

    let mut returned: Option<(R, Option<Value>)> = None;
    if let Some(exchange) = data.exchange.as_mut() {
        if let Some(error) = exchange.error.take() {
            debug!(point = %point, "call aborted by start extensions");
            return Err(error);
        }

        if !exchange.result.is_set() {
            match op(exchange.call_args()).await {
                Ok(value) => {
                    let as_json = match serde_json::to_value(&value) {
                        Ok(json) => {
                            exchange.result.set(json.clone());
                            Some(json)
                        }
                        Err(e) => {
                            debug!(point = %point, error = %e, "result has no JSON form");
                            None
                        }
                    };
                    returned = Some((value, as_json));
                }
                Err(e) => exchange.error.set(e),
            }
        } else {
            debug!(point = %point, "call short-circuited by start extensions");
        }
    }

    dispatcher.call_extensions(&end, agent, &mut data).await?;

    let Some(mut exchange) = data.exchange.take() else {
        return Ok(serde_json::from_value(Value::Null)?);
    };
    if let Some(error) = exchange.error.take() {
        return Err(error);
    }

    let result = exchange.result.take();
    if let Some((value, original)) = returned {
        if original == result {
            return Ok(value);
        }
    }
    serde_json::from_value(result.unwrap_or(Value::Null))
        .with_context(|| format!("extensions at {point} produced a result of the wrong shape"))
}

/// [`intercept`] for synchronous operations.
///
/// Drives its own current-thread runtime. Called from inside a tokio
/// runtime it returns an error; use [`intercept`] there.
pub fn intercept_blocking<R, F>(
    dispatcher: &ExtensionDispatcher,
    point: &str,
    agent: Option<&Agent>,
    args: CallArgs,
    op: F,
) -> Result<R>
where
    R: Serialize + DeserializeOwned,
    F: FnOnce(CallArgs) -> Result<R>,
{
    if !can_intercept(point) {
        return op(args);
    }
    if tokio::runtime::Handle::try_current().is_ok() {
        bail!("intercept_blocking called for {point} inside an async runtime; use intercept");
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime for intercepted call")?;
    runtime.block_on(intercept(dispatcher, point, agent, args, |call| async move {
        op(call)
    }))
}

fn can_intercept(point: &str) -> bool {
    match validate_point(point) {
        Ok(()) => true,
        Err(e) => {
            if !point.is_empty() {
                debug!(point = %point, error = %e, "calling without interception");
            }
            false
        }
    }
}
