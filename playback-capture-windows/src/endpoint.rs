use std::fmt;

/// How a render endpoint is attached to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointTransport {
    Bluetooth,
    BluetoothLe,
    Usb,
    BuiltIn,
    Unknown,
}

impl EndpointTransport {
    /// Classify from the `PKEY_Device_EnumeratorName` property.
    pub fn from_enumerator_name(name: &str) -> Self {
        let name = name.to_ascii_uppercase();
        if name.contains("BTHLEENUM") {
            Self::BluetoothLe
        } else if name.contains("BTHENUM") {
            Self::Bluetooth
        } else if name.contains("USB") {
            Self::Usb
        } else {
            Self::BuiltIn
        }
    }
}

/// An active render endpoint whose mix can be captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackEndpoint {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub transport: EndpointTransport,
}

impl fmt::Display for LoopbackEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.is_default { "*" } else { " " };
        write!(f, "{} {} ({:?})\n    {}", marker, self.name, self.transport, self.id)
    }
}
