use strum::EnumCount;

use crate::{host::Host, schema::Operation};

/// The registered event type plus every handle the hot path needs.
///
/// Created exactly once by [`SchemaBuilder::build`](super::SchemaBuilder::build) and
/// never mutated afterwards. Every reference held here is a *global* reference, so
/// for [`JniHost`](crate::host::JniHost) the handle is `Send + Sync` and can be read
/// concurrently from any thread that performs an intercepted call.
pub struct EventFactoryHandle<H: Host> {
    pub(crate) factory: H::Ref,
    pub(crate) new_event: H::MethodId,
    pub(crate) set: H::MethodId,
    pub(crate) begin: H::MethodId,
    pub(crate) commit: H::MethodId,
    pub(crate) boolean_true: H::Ref,
    pub(crate) boolean_false: H::Ref,
    pub(crate) labels: [H::Ref; Operation::COUNT],
    pub(crate) copied_index: i32,
    pub(crate) operation_index: i32,
}

impl<H: Host> EventFactoryHandle<H> {
    /// The `jdk.jfr.EventFactory` instance.
    #[must_use]
    pub fn factory(&self) -> H::Ref {
        self.factory
    }

    /// The cached `Boolean.TRUE` or `Boolean.FALSE` singleton.
    #[must_use]
    pub fn boolean(&self, value: bool) -> H::Ref {
        if value {
            self.boolean_true
        } else {
            self.boolean_false
        }
    }

    /// The cached `java.lang.String` call-site label for `operation`.
    #[must_use]
    pub fn label(&self, operation: Operation) -> H::Ref {
        self.labels[operation.index()]
    }

    /// `Event.set` index of the `copied` field.
    #[must_use]
    pub fn copied_index(&self) -> i32 {
        self.copied_index
    }

    /// `Event.set` index of the `operation` field.
    #[must_use]
    pub fn operation_index(&self) -> i32 {
        self.operation_index
    }

    /// Deletes every global reference held by the handle.
    ///
    /// Only for explicit teardown; the agent itself keeps the handle for the lifetime
    /// of the process.
    pub fn release(self, host: &H) {
        for label in self.labels {
            host.delete_global_ref(label);
        }
        host.delete_global_ref(self.boolean_false);
        host.delete_global_ref(self.boolean_true);
        host.delete_global_ref(self.factory);
    }
}

impl<H: Host> std::fmt::Debug for EventFactoryHandle<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFactoryHandle")
            .field("factory", &self.factory)
            .field("new_event", &self.new_event)
            .field("set", &self.set)
            .field("begin", &self.begin)
            .field("commit", &self.commit)
            .field("copied_index", &self.copied_index)
            .field("operation_index", &self.operation_index)
            .finish_non_exhaustive()
    }
}
