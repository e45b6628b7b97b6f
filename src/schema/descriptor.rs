//! Declarative event-type description.
//!
//! These types describe *what* the flight recorder should register, independent of
//! how it is lowered into `jdk.jfr` objects. [`SchemaBuilder`](super::SchemaBuilder)
//! consumes an [`EventTypeDescriptor`] once and discards it.

use std::fmt;

use crate::Result;

/// Binary class names of the `jdk.jfr` annotation types used for event metadata.
pub mod annotations {
    /// `jdk.jfr.Name`
    pub const NAME: &str = "jdk/jfr/Name";
    /// `jdk.jfr.Label`
    pub const LABEL: &str = "jdk/jfr/Label";
    /// `jdk.jfr.Description`
    pub const DESCRIPTION: &str = "jdk/jfr/Description";
    /// `jdk.jfr.Category`
    pub const CATEGORY: &str = "jdk/jfr/Category";
}

/// Value carried by an annotation element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnnotationValue {
    /// A scalar string value, e.g. `@Label("JNI Critical")`
    String(String),
    /// A string array value, e.g. `@Category({"JNI"})`
    StringArray(Vec<String>),
}

/// A single annotation record: annotation type plus value.
///
/// Lowered to `new AnnotationElement(<type>.class, <value>)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Annotation {
    /// Binary class name of the annotation type
    pub type_name: &'static str,
    /// The annotation's `value()` element
    pub value: AnnotationValue,
}

impl Annotation {
    /// Creates an annotation with a scalar string value.
    pub fn string(type_name: &'static str, value: impl Into<String>) -> Self {
        Annotation {
            type_name,
            value: AnnotationValue::String(value.into()),
        }
    }

    /// Creates an annotation with a string array value.
    pub fn strings<I, S>(type_name: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Annotation {
            type_name,
            value: AnnotationValue::StringArray(values.into_iter().map(Into::into).collect()),
        }
    }
}

/// The type of an event field.
///
/// Primitive kinds are resolved through the `TYPE` constant of their wrapper class
/// (`boolean.class` is `java.lang.Boolean.TYPE`); references resolve by class name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    /// `boolean`
    Boolean,
    /// `byte`
    Byte,
    /// `char`
    Char,
    /// `short`
    Short,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
    /// A reference type, by binary class name (`java/lang/String`)
    Reference(&'static str),
}

impl FieldType {
    /// The wrapper class whose static `TYPE` field holds the primitive class object.
    ///
    /// Returns `None` for reference types.
    #[must_use]
    pub fn wrapper_class(&self) -> Option<&'static str> {
        match self {
            FieldType::Boolean => Some("java/lang/Boolean"),
            FieldType::Byte => Some("java/lang/Byte"),
            FieldType::Char => Some("java/lang/Character"),
            FieldType::Short => Some("java/lang/Short"),
            FieldType::Int => Some("java/lang/Integer"),
            FieldType::Long => Some("java/lang/Long"),
            FieldType::Float => Some("java/lang/Float"),
            FieldType::Double => Some("java/lang/Double"),
            FieldType::Reference(_) => None,
        }
    }

    /// The JVM type descriptor (`Z`, `Ljava/lang/String;`, ...).
    #[must_use]
    pub fn descriptor(&self) -> String {
        match self {
            FieldType::Boolean => "Z".to_string(),
            FieldType::Byte => "B".to_string(),
            FieldType::Char => "C".to_string(),
            FieldType::Short => "S".to_string(),
            FieldType::Int => "I".to_string(),
            FieldType::Long => "J".to_string(),
            FieldType::Float => "F".to_string(),
            FieldType::Double => "D".to_string(),
            FieldType::Reference(class) => format!("L{};", class),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Reference(class) => write!(f, "{}", class.replace('/', ".")),
            primitive => {
                let name = match primitive {
                    FieldType::Boolean => "boolean",
                    FieldType::Byte => "byte",
                    FieldType::Char => "char",
                    FieldType::Short => "short",
                    FieldType::Int => "int",
                    FieldType::Long => "long",
                    FieldType::Float => "float",
                    _ => "double",
                };
                f.write_str(name)
            }
        }
    }
}

/// Description of one event field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field type
    pub field_type: FieldType,
    /// Field name, unique within the event
    pub name: String,
    /// Human-readable label (`@Label`)
    pub label: Option<String>,
    /// Human-readable description (`@Description`)
    pub description: Option<String>,
}

impl FieldDescriptor {
    /// Creates an undecorated field.
    pub fn new(field_type: FieldType, name: impl Into<String>) -> Self {
        FieldDescriptor {
            field_type,
            name: name.into(),
            label: None,
            description: None,
        }
    }

    /// Sets the field's label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the field's description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The field's metadata annotations: label, then description.
    #[must_use]
    pub fn annotations(&self) -> Vec<Annotation> {
        let mut annotations = Vec::with_capacity(2);
        if let Some(label) = &self.label {
            annotations.push(Annotation::string(annotations::LABEL, label.as_str()));
        }
        if let Some(description) = &self.description {
            annotations.push(Annotation::string(
                annotations::DESCRIPTION,
                description.as_str(),
            ));
        }
        annotations
    }
}

/// Description of a dynamically defined event type.
///
/// # Examples
///
/// ```rust
/// use jni_critical_reporter::schema::{EventTypeDescriptor, FieldDescriptor, FieldType};
///
/// let descriptor = EventTypeDescriptor::new("com.example.Event")
///     .with_label("Example")
///     .with_category(["Demo"])
///     .with_field(FieldDescriptor::new(FieldType::Int, "count"));
///
/// assert_eq!(descriptor.field_index("count").unwrap(), 0);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventTypeDescriptor {
    /// Fully qualified event name (`@Name`)
    pub name: String,
    /// Category path (`@Category`)
    pub category: Vec<String>,
    /// Human-readable label (`@Label`)
    pub label: Option<String>,
    /// Human-readable description (`@Description`)
    pub description: Option<String>,
    /// Fields in declaration order; the position is the index used by `Event.set`
    pub fields: Vec<FieldDescriptor>,
}

impl EventTypeDescriptor {
    /// Creates an event type with no metadata and no fields.
    pub fn new(name: impl Into<String>) -> Self {
        EventTypeDescriptor {
            name: name.into(),
            category: Vec::new(),
            label: None,
            description: None,
            fields: Vec::new(),
        }
    }

    /// Sets the event's label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the event's description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the event's category path.
    #[must_use]
    pub fn with_category<I, S>(mut self, category: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.category = category.into_iter().map(Into::into).collect();
        self
    }

    /// Appends a field.
    #[must_use]
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// The event-level annotations in registration order: name, label, description,
    /// category. Absent optional metadata is skipped.
    #[must_use]
    pub fn annotations(&self) -> Vec<Annotation> {
        let mut annotations = vec![Annotation::string(annotations::NAME, self.name.as_str())];
        if let Some(label) = &self.label {
            annotations.push(Annotation::string(annotations::LABEL, label.as_str()));
        }
        if let Some(description) = &self.description {
            annotations.push(Annotation::string(
                annotations::DESCRIPTION,
                description.as_str(),
            ));
        }
        if !self.category.is_empty() {
            annotations.push(Annotation::strings(
                annotations::CATEGORY,
                self.category.iter().map(String::as_str),
            ));
        }
        annotations
    }

    /// Returns the `Event.set` index of the named field.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Lookup`] if the event has no such field.
    pub fn field_index(&self, name: &str) -> Result<i32> {
        self.fields
            .iter()
            .position(|field| field.name == name)
            .and_then(|index| i32::try_from(index).ok())
            .ok_or_else(|| lookup_error!("event {} has no field {}", self.name, name))
    }
}
