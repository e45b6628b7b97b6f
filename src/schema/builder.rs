//! Lowering of an [`EventTypeDescriptor`] into a registered `jdk.jfr` event type.

use strum::{EnumCount, IntoEnumIterator};
use tracing::{debug, info};

use crate::{
    host::{Host, JValue},
    schema::{
        Annotation, AnnotationValue, EventFactoryHandle, EventTypeDescriptor, FieldDescriptor,
        FieldType, Operation, COPIED_FIELD, OPERATION_FIELD,
    },
    Error, Result,
};

const ANNOTATION_ELEMENT: &str = "jdk/jfr/AnnotationElement";
const VALUE_DESCRIPTOR: &str = "jdk/jfr/ValueDescriptor";
const EVENT_FACTORY: &str = "jdk/jfr/EventFactory";
const EVENT: &str = "jdk/jfr/Event";
const LIST: &str = "java/util/List";
const STRING: &str = "java/lang/String";
const OBJECT: &str = "java/lang/Object";
const BOOLEAN: &str = "java/lang/Boolean";

const CONSTRUCTOR: &str = "<init>";
const ANNOTATION_ELEMENT_INIT: &str = "(Ljava/lang/Class;Ljava/lang/Object;)V";
const VALUE_DESCRIPTOR_INIT: &str = "(Ljava/lang/Class;Ljava/lang/String;Ljava/util/List;)V";
const CREATE: &str = "(Ljava/util/List;Ljava/util/List;)Ljdk/jfr/EventFactory;";
const NEW_EVENT: &str = "()Ljdk/jfr/Event;";
const SET: &str = "(ILjava/lang/Object;)V";
const VOID: &str = "()V";
const LIST_OF_ARRAY: &str = "([Ljava/lang/Object;)Ljava/util/List;";

/// `List.of` has fixed-arity overloads up to this many elements.
const LIST_OF_MAX_ARITY: usize = 10;

/// Local references created while building, deleted when the builder returns.
struct LocalFrame<'a, H: Host> {
    host: &'a H,
    refs: Vec<H::Ref>,
}

impl<'a, H: Host> LocalFrame<'a, H> {
    fn new(host: &'a H) -> Self {
        LocalFrame {
            host,
            refs: Vec::with_capacity(32),
        }
    }

    fn keep(&mut self, local: H::Ref) -> H::Ref {
        self.refs.push(local);
        local
    }
}

impl<H: Host> Drop for LocalFrame<'_, H> {
    fn drop(&mut self) {
        for local in self.refs.drain(..).rev() {
            self.host.delete_local_ref(local);
        }
    }
}

/// Global references that are rolled back unless the build succeeds.
struct GlobalRefs<'a, H: Host> {
    host: &'a H,
    refs: Vec<H::Ref>,
}

impl<'a, H: Host> GlobalRefs<'a, H> {
    fn new(host: &'a H) -> Self {
        GlobalRefs {
            host,
            refs: Vec::new(),
        }
    }

    fn promote(&mut self, local: H::Ref) -> Result<H::Ref> {
        let global = self.host.new_global_ref(local)?;
        self.refs.push(global);
        Ok(global)
    }

    /// Hands ownership of every promoted reference to the caller.
    fn disarm(mut self) {
        self.refs.clear();
    }
}

impl<H: Host> Drop for GlobalRefs<'_, H> {
    fn drop(&mut self) {
        for global in self.refs.drain(..) {
            self.host.delete_global_ref(global);
        }
    }
}

/// The `jdk.jfr` and `java.*` types used during the build.
struct RuntimeTypes<H: Host> {
    annotation_element: H::Ref,
    annotation_element_init: H::MethodId,
    value_descriptor: H::Ref,
    value_descriptor_init: H::MethodId,
    event_factory: H::Ref,
    event: H::Ref,
    list: H::Ref,
    string: H::Ref,
}

impl<H: Host> RuntimeTypes<H> {
    fn resolve(host: &H, frame: &mut LocalFrame<'_, H>) -> Result<Self> {
        let annotation_element = frame.keep(host.find_class(ANNOTATION_ELEMENT)?);
        let value_descriptor = frame.keep(host.find_class(VALUE_DESCRIPTOR)?);
        Ok(RuntimeTypes {
            annotation_element,
            annotation_element_init: host.method_id(
                annotation_element,
                CONSTRUCTOR,
                ANNOTATION_ELEMENT_INIT,
            )?,
            value_descriptor,
            value_descriptor_init: host.method_id(
                value_descriptor,
                CONSTRUCTOR,
                VALUE_DESCRIPTOR_INIT,
            )?,
            event_factory: frame.keep(host.find_class(EVENT_FACTORY)?),
            event: frame.keep(host.find_class(EVENT)?),
            list: frame.keep(host.find_class(LIST)?),
            string: frame.keep(host.find_class(STRING)?),
        })
    }
}

/// Registers an event type with the flight recorder through reflection.
///
/// The builder performs the equivalent of
///
/// ```java
/// List<AnnotationElement> annotations = List.of(
///     new AnnotationElement(Name.class, "..."),
///     new AnnotationElement(Label.class, "..."),
///     new AnnotationElement(Description.class, "..."),
///     new AnnotationElement(Category.class, new String[] { "..." }));
/// List<ValueDescriptor> fields = List.of(
///     new ValueDescriptor(boolean.class, "copied", List.of(...)),
///     new ValueDescriptor(String.class, "operation", List.of(...)));
/// EventFactory factory = EventFactory.create(annotations, fields);
/// ```
///
/// and then caches the method ids, boolean singletons and call-site labels needed to
/// emit events without any further lookups.
///
/// All intermediate local references are deleted before [`SchemaBuilder::build`]
/// returns. On failure every global reference created so far is deleted as well, so
/// nothing survives a failed build.
pub struct SchemaBuilder<'a, H: Host> {
    host: &'a H,
}

impl<'a, H: Host> SchemaBuilder<'a, H> {
    /// Creates a builder over `host`.
    #[must_use]
    pub fn new(host: &'a H) -> Self {
        SchemaBuilder { host }
    }

    /// Registers `descriptor` and returns the cached handles.
    ///
    /// The descriptor must declare the [`COPIED_FIELD`] and [`OPERATION_FIELD`]
    /// fields; their positions become the indices passed to `Event.set`.
    ///
    /// # Errors
    ///
    /// - [`Error::Lookup`] if a class, method or field cannot be resolved, or the
    ///   descriptor lacks one of the required fields
    /// - [`Error::Construction`] if an annotation, descriptor, list or string cannot be built
    /// - [`Error::Registration`] if `EventFactory.create` throws
    pub fn build(&self, descriptor: &EventTypeDescriptor) -> Result<EventFactoryHandle<H>> {
        let copied_index = descriptor.field_index(COPIED_FIELD)?;
        let operation_index = descriptor.field_index(OPERATION_FIELD)?;

        let host = self.host;
        let mut frame = LocalFrame::new(host);
        let mut globals = GlobalRefs::new(host);
        let types = RuntimeTypes::resolve(host, &mut frame)?;

        let annotations = self.annotation_list(&mut frame, &types, &descriptor.annotations())?;
        let mut fields = Vec::with_capacity(descriptor.fields.len());
        for field in &descriptor.fields {
            fields.push(self.value_descriptor(&mut frame, &types, field)?);
        }
        let fields = self.list_of(&mut frame, &types, &fields)?;

        let create = host.static_method_id(types.event_factory, "create", CREATE)?;
        let factory = host
            .call_static_object_method(
                types.event_factory,
                create,
                &[JValue::Object(annotations), JValue::Object(fields)],
            )
            .map_err(Error::into_registration)?;
        let factory = globals.promote(frame.keep(factory))?;
        debug!(event = %descriptor.name, "EventFactory.create succeeded");

        let new_event = host.method_id(types.event_factory, "newEvent", NEW_EVENT)?;
        let set = host.method_id(types.event, "set", SET)?;
        let begin = host.method_id(types.event, "begin", VOID)?;
        let commit = host.method_id(types.event, "commit", VOID)?;

        let boolean = frame.keep(host.find_class(BOOLEAN)?);
        let boolean_true = globals.promote(self.boolean_constant(&mut frame, boolean, "TRUE")?)?;
        let boolean_false =
            globals.promote(self.boolean_constant(&mut frame, boolean, "FALSE")?)?;

        let mut labels = Vec::with_capacity(Operation::COUNT);
        for operation in Operation::iter() {
            let label = frame.keep(host.new_string(operation.label())?);
            labels.push(globals.promote(label)?);
        }
        let labels: [H::Ref; Operation::COUNT] = labels
            .try_into()
            .map_err(|_| construction_error!("expected {} labels", Operation::COUNT))?;

        globals.disarm();
        info!(
            event = %descriptor.name,
            fields = descriptor.fields.len(),
            "registered event type"
        );

        Ok(EventFactoryHandle {
            factory,
            new_event,
            set,
            begin,
            commit,
            boolean_true,
            boolean_false,
            labels,
            copied_index,
            operation_index,
        })
    }

    /// `new AnnotationElement(<type>.class, <value>)`
    fn annotation(
        &self,
        frame: &mut LocalFrame<'_, H>,
        types: &RuntimeTypes<H>,
        annotation: &Annotation,
    ) -> Result<H::Ref> {
        let host = self.host;
        let annotation_type = frame.keep(host.find_class(annotation.type_name)?);
        let value = match &annotation.value {
            AnnotationValue::String(value) => frame.keep(host.new_string(value)?),
            AnnotationValue::StringArray(values) => self.string_array(frame, types, values)?,
        };
        let element = host.new_object(
            types.annotation_element,
            types.annotation_element_init,
            &[JValue::Object(annotation_type), JValue::Object(value)],
        )?;
        Ok(frame.keep(element))
    }

    fn annotation_list(
        &self,
        frame: &mut LocalFrame<'_, H>,
        types: &RuntimeTypes<H>,
        annotations: &[Annotation],
    ) -> Result<H::Ref> {
        let mut elements = Vec::with_capacity(annotations.len());
        for annotation in annotations {
            elements.push(self.annotation(frame, types, annotation)?);
        }
        self.list_of(frame, types, &elements)
    }

    fn string_array(
        &self,
        frame: &mut LocalFrame<'_, H>,
        types: &RuntimeTypes<H>,
        values: &[String],
    ) -> Result<H::Ref> {
        let host = self.host;
        let array = frame.keep(host.new_object_array(values.len(), types.string)?);
        for (index, value) in values.iter().enumerate() {
            let element = frame.keep(host.new_string(value)?);
            host.set_object_array_element(array, index, element)?;
        }
        Ok(array)
    }

    /// `List.of(...)`, through the fixed-arity overloads where possible.
    fn list_of(
        &self,
        frame: &mut LocalFrame<'_, H>,
        types: &RuntimeTypes<H>,
        elements: &[H::Ref],
    ) -> Result<H::Ref> {
        let host = self.host;
        let list = if elements.len() <= LIST_OF_MAX_ARITY {
            let signature = list_of_signature(elements.len());
            let of = host.static_method_id(types.list, "of", &signature)?;
            let args: Vec<_> = elements.iter().copied().map(JValue::Object).collect();
            host.call_static_object_method(types.list, of, &args)
        } else {
            let object = frame.keep(host.find_class(OBJECT)?);
            let array = frame.keep(host.new_object_array(elements.len(), object)?);
            for (index, element) in elements.iter().enumerate() {
                host.set_object_array_element(array, index, *element)?;
            }
            let of = host.static_method_id(types.list, "of", LIST_OF_ARRAY)?;
            host.call_static_object_method(types.list, of, &[JValue::Object(array)])
        }
        .map_err(|e| construction_error!("List.of({} elements) - {}", elements.len(), e))?;
        Ok(frame.keep(list))
    }

    /// `new ValueDescriptor(<type>.class, "<name>", List.of(<annotations>))`
    fn value_descriptor(
        &self,
        frame: &mut LocalFrame<'_, H>,
        types: &RuntimeTypes<H>,
        field: &FieldDescriptor,
    ) -> Result<H::Ref> {
        let host = self.host;
        let field_class = self.field_class(frame, &field.field_type)?;
        let name = frame.keep(host.new_string(&field.name)?);
        let annotations = self.annotation_list(frame, types, &field.annotations())?;
        debug!(
            field = %field.name,
            descriptor = %field.field_type.descriptor(),
            "building value descriptor"
        );
        let descriptor = host.new_object(
            types.value_descriptor,
            types.value_descriptor_init,
            &[
                JValue::Object(field_class),
                JValue::Object(name),
                JValue::Object(annotations),
            ],
        )?;
        Ok(frame.keep(descriptor))
    }

    /// The `Class` object of a field type; primitives come from `<Wrapper>.TYPE`.
    fn field_class(&self, frame: &mut LocalFrame<'_, H>, field_type: &FieldType) -> Result<H::Ref> {
        let host = self.host;
        match (field_type, field_type.wrapper_class()) {
            (_, Some(wrapper)) => {
                let wrapper = frame.keep(host.find_class(wrapper)?);
                let field = host.static_field_id(wrapper, "TYPE", "Ljava/lang/Class;")?;
                Ok(frame.keep(host.static_object_field(wrapper, field)?))
            }
            (FieldType::Reference(class), None) => Ok(frame.keep(host.find_class(class)?)),
            (primitive, None) => Err(lookup_error!("no wrapper class for {}", primitive)),
        }
    }

    fn boolean_constant(
        &self,
        frame: &mut LocalFrame<'_, H>,
        boolean: H::Ref,
        name: &str,
    ) -> Result<H::Ref> {
        let host = self.host;
        let field = host.static_field_id(boolean, name, "Ljava/lang/Boolean;")?;
        Ok(frame.keep(host.static_object_field(boolean, field)?))
    }
}

/// Signature of the `List.of` overload taking `arity` elements.
fn list_of_signature(arity: usize) -> String {
    format!("({})Ljava/util/List;", "Ljava/lang/Object;".repeat(arity))
}
