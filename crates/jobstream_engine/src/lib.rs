//! Jobstream engine: transport, REST, configuration and draft persistence.
mod channel;
mod config;
mod drafts;
mod editor;
mod filename;
mod persist;
mod rest;
mod transport;

pub use channel::{
    ChannelControl, ChannelError, ChannelEvent, ChannelOptions, JobChannel, JobObserver,
};
pub use config::{ConfigError, ConfigResolver, RuntimeConfig};
pub use drafts::{DraftStore, StoredDraft};
pub use editor::{EditorError, ResultEditor, ResultKind};
pub use filename::draft_filename;
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use rest::{
    ApiError, ClientSettings, ExportFormat, ExportedDocument, GatewayClient, JobRecord, JobVersion,
};
pub use transport::{ConnectError, Connection, Connector, TransportEvent, WsConnector};
