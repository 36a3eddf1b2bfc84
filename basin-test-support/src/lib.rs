//! Shared test utilities used across basin crates.
//!
//! Holds the tracing recorder used to assert instrumentation, the property
//! test run profile, and seeded Gaussian blob fixtures.

pub mod blobs;

pub mod ci {
    //! Environment-driven knobs shared by CI and local test runs.
    pub mod property_test_profile;
}

pub mod tracing {
    //! Recording layer for capturing spans and events in tests.
    use std::{
        collections::HashMap,
        fmt,
        sync::{Arc, Mutex, MutexGuard, PoisonError},
    };

    use tracing::{
        Event, Level, Subscriber,
        dispatcher::DefaultGuard,
        field::{Field, Visit},
        span::{Attributes, Id, Record},
    };
    use tracing_subscriber::{Layer, layer::Context, prelude::*, registry::LookupSpan};

    /// Layer that keeps every closed span and every event for later
    /// assertions.
    ///
    /// Clones share storage, so a clone handed to the subscriber keeps
    /// feeding the original.
    #[derive(Clone, Default)]
    pub struct RecordingLayer {
        spans: Arc<Mutex<Vec<SpanRecord>>>,
        events: Arc<Mutex<Vec<EventRecord>>>,
    }

    impl RecordingLayer {
        /// Installs a fresh recorder as the thread-local default subscriber.
        ///
        /// Recording stops when the returned guard is dropped.
        ///
        /// # Examples
        /// ```
        /// use basin_test_support::tracing::RecordingLayer;
        ///
        /// let (layer, guard) = RecordingLayer::install();
        /// tracing::info_span!("demo", answer = 42).in_scope(|| {});
        /// drop(guard);
        /// assert_eq!(layer.span("demo").as_ref().and_then(|s| s.field("answer")), Some("42"));
        /// ```
        #[must_use]
        pub fn install() -> (Self, DefaultGuard) {
            let layer = Self::default();
            let subscriber = tracing_subscriber::registry().with(layer.clone());
            let guard = ::tracing::subscriber::set_default(subscriber);
            (layer, guard)
        }

        /// Returns the closed spans in completion order.
        ///
        /// # Examples
        /// ```
        /// use basin_test_support::tracing::RecordingLayer;
        ///
        /// let layer = RecordingLayer::default();
        /// assert!(layer.spans().is_empty());
        /// ```
        #[must_use]
        pub fn spans(&self) -> Vec<SpanRecord> {
            lock(&self.spans).clone()
        }

        /// Returns the emitted events in emission order.
        #[must_use]
        pub fn events(&self) -> Vec<EventRecord> {
            lock(&self.events).clone()
        }

        /// Returns the first closed span called `name`.
        #[must_use]
        pub fn span(&self, name: &str) -> Option<SpanRecord> {
            lock(&self.spans).iter().find(|span| span.name == name).cloned()
        }

        /// Returns every event whose message equals `message`.
        #[must_use]
        pub fn events_with_message(&self, message: &str) -> Vec<EventRecord> {
            lock(&self.events)
                .iter()
                .filter(|event| event.field("message") == Some(message))
                .cloned()
                .collect()
        }
    }

    fn lock<T>(records: &Mutex<T>) -> MutexGuard<'_, T> {
        records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Closed span with its name and recorded fields.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SpanRecord {
        /// Span name from the metadata.
        pub name: String,
        /// Fields recorded at creation or later via `Span::record`.
        pub fields: HashMap<String, String>,
    }

    impl SpanRecord {
        /// Returns the rendered value of `field`.
        #[must_use]
        pub fn field(&self, field: &str) -> Option<&str> {
            self.fields.get(field).map(String::as_str)
        }
    }

    /// Emitted event with its level, target and fields.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct EventRecord {
        /// Event level.
        pub level: Level,
        /// Event target, usually the emitting module path.
        pub target: String,
        /// Structured fields, including `message`.
        pub fields: HashMap<String, String>,
    }

    impl EventRecord {
        /// Returns the rendered value of `field`.
        #[must_use]
        pub fn field(&self, field: &str) -> Option<&str> {
            self.fields.get(field).map(String::as_str)
        }
    }

    struct OpenSpan(SpanRecord);

    impl<S> Layer<S> for RecordingLayer
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
            let Some(span) = ctx.span(id) else {
                return;
            };
            let mut record = SpanRecord {
                name: attrs.metadata().name().to_owned(),
                fields: HashMap::new(),
            };
            attrs.record(&mut FieldCollector(&mut record.fields));
            span.extensions_mut().insert(OpenSpan(record));
        }

        fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
            let Some(span) = ctx.span(id) else {
                return;
            };
            if let Some(OpenSpan(record)) = span.extensions_mut().get_mut::<OpenSpan>() {
                values.record(&mut FieldCollector(&mut record.fields));
            }
        }

        fn on_close(&self, id: Id, ctx: Context<'_, S>) {
            let Some(span) = ctx.span(&id) else {
                return;
            };
            if let Some(OpenSpan(record)) = span.extensions_mut().remove::<OpenSpan>() {
                lock(&self.spans).push(record);
            }
        }

        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = HashMap::new();
            event.record(&mut FieldCollector(&mut fields));
            lock(&self.events).push(EventRecord {
                level: *event.metadata().level(),
                target: event.metadata().target().to_owned(),
                fields,
            });
        }
    }

    struct FieldCollector<'a>(&'a mut HashMap<String, String>);

    impl FieldCollector<'_> {
        fn put(&mut self, field: &Field, value: String) {
            self.0.insert(field.name().to_owned(), value);
        }
    }

    impl Visit for FieldCollector<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.put(field, format!("{value:?}"));
        }

        fn record_str(&mut self, field: &Field, value: &str) {
            self.put(field, value.to_owned());
        }

        fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
            self.put(field, value.to_string());
        }

        fn record_bool(&mut self, field: &Field, value: bool) {
            self.put(field, value.to_string());
        }

        fn record_i64(&mut self, field: &Field, value: i64) {
            self.put(field, value.to_string());
        }

        fn record_u64(&mut self, field: &Field, value: u64) {
            self.put(field, value.to_string());
        }

        fn record_f64(&mut self, field: &Field, value: f64) {
            self.put(field, value.to_string());
        }
    }

}
