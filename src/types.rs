/// Identifier of one accelerator device, in `[0, device_count)`.
pub type DeviceId = u32;

/// Index of one replicated field within a round's field set.
pub type FieldId = usize;

/// Describes one array that must be replicated onto every device.
///
/// Element counts and sizes are identical across devices; each device
/// owns an independently allocated replica of the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Human-readable name, used in logs and errors.
    pub name: &'static str,
    /// Size of one element in bytes.
    pub elem_bytes: usize,
    /// Number of elements.
    pub len: usize,
}

impl FieldSpec {
    /// Total size of the field in bytes.
    pub const fn size_bytes(&self) -> usize {
        self.elem_bytes * self.len
    }
}

impl std::fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}x{}B]", self.name, self.len, self.elem_bytes)
    }
}

/// Origin of a transfer edge: the host staging buffer, or a replica
/// already populated on another device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Host staging buffer.
    Host,
    /// Replica on another device; the transfer must wait for that
    /// replica's readiness token.
    Device(DeviceId),
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Host => f.write_str("host"),
            Source::Device(d) => write!(f, "device {d}"),
        }
    }
}
