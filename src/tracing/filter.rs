use tracing::Level;
use tracing::Metadata;
use tracing_subscriber::layer::Context;
use tracing_subscriber::layer::Filter;
use tracing_subscriber::registry::LookupSpan;

const CRATE_TARGET: &str = "tabi";

fn is_ours(meta: &Metadata<'_>) -> bool { meta.target().starts_with(CRATE_TARGET) }

/// Exactly DEBUG, this crate only
pub struct DebugOnlyFilter;

impl<S> Filter<S> for DebugOnlyFilter
where
    S: tracing::Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn enabled(
        &self,
        meta: &Metadata<'_>,
        _ctx: &Context<'_, S>,
    ) -> bool {
        meta.level() == &Level::DEBUG && is_ours(meta)
    }
}

/// WARN and ERROR
pub struct ErrorWarnFilter;

impl<S> Filter<S> for ErrorWarnFilter
where
    S: tracing::Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn enabled(
        &self,
        meta: &Metadata<'_>,
        _ctx: &Context<'_, S>,
    ) -> bool {
        (meta.level() == &Level::ERROR || meta.level() == &Level::WARN) && is_ours(meta)
    }
}

#[cfg(feature = "dev")]
pub struct InfoOnlyFilter;

#[cfg(feature = "dev")]
impl<S> Filter<S> for InfoOnlyFilter
where
    S: tracing::Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn enabled(
        &self,
        meta: &Metadata<'_>,
        _ctx: &Context<'_, S>,
    ) -> bool {
        meta.level() == &Level::INFO && is_ours(meta)
    }
}

pub struct ErrorOnlyFilter;

impl<S> Filter<S> for ErrorOnlyFilter
where
    S: tracing::Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn enabled(
        &self,
        meta: &Metadata<'_>,
        _ctx: &Context<'_, S>,
    ) -> bool {
        meta.level() == &Level::ERROR && is_ours(meta)
    }
}
