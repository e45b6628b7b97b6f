//! Event schema: description, registration and cached handles.
//!
//! The flight recorder has no compile-time view of events defined by a native agent,
//! so the event type is declared at runtime through `jdk.jfr.EventFactory`. This
//! module splits that into a declarative half and an executable half:
//!
//! - [`EventTypeDescriptor`], [`FieldDescriptor`], [`FieldType`] and [`Annotation`]
//!   describe the event type as plain data
//! - [`SchemaBuilder`] lowers a descriptor through a [`Host`](crate::host::Host)
//!   into a registered factory
//! - [`EventFactoryHandle`] keeps the factory plus every method id and singleton the
//!   emitter needs afterwards
//!
//! # Registered Event
//!
//! [`critical_event`] describes the one event type the agent registers:
//!
//! | Field | Type | Label | Description |
//! |-------|------|-------|-------------|
//! | `copied` | `boolean` | IsCopy | Whether the memory was copied |
//! | `operation` | `String` | Operation | Name of the JNI critical method |
//!
//! # Examples
//!
//! ```rust,ignore
//! use jni_critical_reporter::schema::{critical_event, SchemaBuilder};
//!
//! let handle = SchemaBuilder::new(&host).build(&critical_event())?;
//! ```

mod builder;
mod descriptor;
mod factory;
mod operation;

pub use builder::SchemaBuilder;
pub use descriptor::{
    annotations, Annotation, AnnotationValue, EventTypeDescriptor, FieldDescriptor, FieldType,
};
pub use factory::EventFactoryHandle;
pub use operation::Operation;

/// Name of the boolean field recording whether the runtime copied the data.
pub const COPIED_FIELD: &str = "copied";

/// Name of the string field recording the call-site label.
pub const OPERATION_FIELD: &str = "operation";

/// Fully qualified name of the registered event type.
pub const EVENT_NAME: &str = "com.github.marschall.jnicriticalreporter.Event";

/// The descriptor of the JNI critical event.
#[must_use]
pub fn critical_event() -> EventTypeDescriptor {
    EventTypeDescriptor::new(EVENT_NAME)
        .with_label("JNI Critical")
        .with_description("Lists invocation of JNI critical methods")
        .with_category(["JNI"])
        .with_field(
            FieldDescriptor::new(FieldType::Boolean, COPIED_FIELD)
                .with_label("IsCopy")
                .with_description("Whether the memory was copied"),
        )
        .with_field(
            FieldDescriptor::new(FieldType::Reference("java/lang/String"), OPERATION_FIELD)
                .with_label("Operation")
                .with_description("Name of the JNI critical method"),
        )
}
