/// Format discriminant of a packet, as named by the packet source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PacketFormat {
    Uncompressed,
    MicE,
    Object,
    Status,
    Compressed,
    Wx,
    Beacon,
    Bulletin,
    Message,
    TelemetryMessage,
    Unsupported,
}

impl PacketFormat {
    /// Wire name, used as the `format` tag value.
    pub fn name(&self) -> &'static str {
        match self {
            PacketFormat::Uncompressed => "uncompressed",
            PacketFormat::MicE => "mic-e",
            PacketFormat::Object => "object",
            PacketFormat::Status => "status",
            PacketFormat::Compressed => "compressed",
            PacketFormat::Wx => "wx",
            PacketFormat::Beacon => "beacon",
            PacketFormat::Bulletin => "bulletin",
            PacketFormat::Message => "message",
            PacketFormat::TelemetryMessage => "telemetry-message",
            PacketFormat::Unsupported => "unsupported",
        }
    }

    /// Formats that produce a line record.
    #[cfg(test)]
    pub(crate) fn recorded() -> &'static [PacketFormat] {
        &[
            PacketFormat::Uncompressed,
            PacketFormat::MicE,
            PacketFormat::Object,
            PacketFormat::Status,
            PacketFormat::Compressed,
            PacketFormat::Wx,
            PacketFormat::Beacon,
            PacketFormat::Bulletin,
            PacketFormat::Message,
        ]
    }
}

impl std::fmt::Display for PacketFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_the_packet_tag() {
        for format in PacketFormat::recorded() {
            let packet: crate::Packet =
                serde_json::from_value(serde_json::json!({"format": format.name()})).unwrap();
            assert_eq!(packet.format(), *format);
            assert_eq!(format.to_string(), format.name());
        }
    }

    #[test]
    fn names_are_valid_tag_values() {
        for format in PacketFormat::recorded() {
            let name = format.name();
            assert!(!name.contains([' ', ',', '=']), "{name}");
        }
    }
}
