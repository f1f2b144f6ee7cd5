//! Span helpers implementing head-based sampling as a pre-filter.
//!
//! The root span decides whether a request is sampled; child spans are
//! only materialised when a parent is active, so unsampled requests pay
//! nothing for instrumentation.

/// Creates a root span at the given sample rate.
///
/// # Behavior
/// - If a parent span exists (is active): always creates a child span
///   so traces stay complete
/// - If no parent exists: makes the sampling decision at the given rate
///
/// # Returns
/// A real span, or `Span::none()` when no parent exists and sampling
/// fails.
#[macro_export]
macro_rules! sample_or_attach_root_span {
    ($sample_percent:expr, $span_name:literal) => {{
        let current = tracing::Span::current();

        if !current.is_disabled() || rand::random::<f32>() < $sample_percent {
            tracing::info_span!($span_name)
        } else {
            tracing::Span::none()
        }
    }};
    ($sample_percent:expr, $span_name:literal, $($fields:tt)*) => {{
        let current = tracing::Span::current();

        if !current.is_disabled() || rand::random::<f32>() < $sample_percent {
            tracing::info_span!($span_name, $($fields)*)
        } else {
            tracing::Span::none()
        }
    }};
}

/// Creates an INFO-level child span only if the parent span is active.
///
/// Returns an **un-entered** `Span` - call `.entered()` or use
/// `.instrument()`.
#[macro_export]
macro_rules! child_span_info {
    ($span_name:literal) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::info_span!($span_name)
        } else {
            ::tracing::Span::none()
        }
    }};
    ($span_name:literal, $($fields:tt)*) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::info_span!($span_name, $($fields)*)
        } else {
            ::tracing::Span::none()
        }
    }};
}

/// DEBUG-level variant of [`child_span_info!`]
#[macro_export]
macro_rules! child_span_debug {
    ($span_name:literal) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::debug_span!($span_name)
        } else {
            ::tracing::Span::none()
        }
    }};
    ($span_name:literal, $($fields:tt)*) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::debug_span!($span_name, $($fields)*)
        } else {
            ::tracing::Span::none()
        }
    }};
}

/// TRACE-level variant of [`child_span_info!`]
#[macro_export]
macro_rules! child_span_trace {
    ($span_name:literal) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::trace_span!($span_name)
        } else {
            ::tracing::Span::none()
        }
    }};
    ($span_name:literal, $($fields:tt)*) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::trace_span!($span_name, $($fields)*)
        } else {
            ::tracing::Span::none()
        }
    }};
}
