//! In-memory fakes of the managed runtime and the event emitter.

mod mock_host;

pub use fake_jni::{FakeCommit, FakeJni};
pub use mock_host::{CommittedEvent, MockHost, MockRef, MockValue, RegisteredField, RegisteredType};
pub use recording::RecordingEmitter;
