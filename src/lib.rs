//! APRS-IS to InfluxDB ingestion.
//!
//! Packets arrive from an APRS-IS server through a [`source::PacketSource`],
//! are flattened into line protocol by [`translate::PacketTranslator`] and
//! written to a [`sink::RecordSink`]. [`coordinator::IngestCoordinator`]
//! owns the connections, the consume loop and the heartbeat.

pub mod cli;
pub mod coordinator;
pub mod heartbeat;
pub mod log;
pub mod packet;
pub mod sink;
pub mod source;
pub mod translate;
pub mod worker;

pub use coordinator::{CoordinatorSettings, IngestCoordinator, StartError};
pub use packet::{Packet, PacketFormat};
pub use translate::{LineRecord, PacketTranslator, TranslateError};
