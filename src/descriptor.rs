use crate::error::ArchiveError;

/// Append-only little-endian record buffer. All ZIP records are staged in
/// one of these before hitting the backing file.
#[derive(Debug)]
pub struct ArchiveDescriptor {
    buffer: Vec<u8>,
}

impl ArchiveDescriptor {
    pub fn new(capacity: u64) -> ArchiveDescriptor {
        ArchiveDescriptor {
            buffer: Vec::with_capacity(capacity as usize),
        }
    }

    pub fn write_u8(&mut self, val: u8) {
        self.buffer.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_u16(&mut self, val: u16) {
        self.buffer.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_u32(&mut self, val: u32) {
        self.buffer.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_u64(&mut self, val: u64) {
        self.buffer.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_str(&mut self, val: &str) {
        self.write_bytes(val.as_bytes());
    }

    pub fn write_bytes(&mut self, val: &[u8]) {
        self.buffer.extend_from_slice(val);
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Cursor over a raw record slice. Reads fail with
/// [`ArchiveError::BadArchiveStructure`] instead of panicking when the
/// record is shorter than its fixed fields claim.
#[derive(Default)]
pub struct ArchiveDescriptorReader {
    index: usize,
}

macro_rules! read_type {
    ($self:expr, $stream:expr, $typ:ty) => {{
        let upper_bound = $self.index + ::std::mem::size_of::<$typ>();

        if upper_bound > $stream.len() {
            return Err(ArchiveError::BadArchiveStructure(format!(
                "record truncated at offset {:}",
                $self.index
            )));
        }

        let read: [u8; ::std::mem::size_of::<$typ>()] =
            $stream[$self.index..upper_bound].try_into().unwrap();
        let value = <$typ>::from_le_bytes(read);

        $self.index = upper_bound;

        value
    }};
}

impl ArchiveDescriptorReader {
    pub fn new() -> ArchiveDescriptorReader {
        ArchiveDescriptorReader { index: 0 }
    }

    pub fn get_index(&self) -> usize {
        self.index
    }

    pub fn read_u32(&mut self, stream: &[u8]) -> Result<u32, ArchiveError> {
        Ok(read_type!(self, stream, u32))
    }

    pub fn read_u16(&mut self, stream: &[u8]) -> Result<u16, ArchiveError> {
        Ok(read_type!(self, stream, u16))
    }

    pub fn read_u8(&mut self, stream: &[u8]) -> Result<u8, ArchiveError> {
        Ok(read_type!(self, stream, u8))
    }

    pub fn read_u64(&mut self, stream: &[u8]) -> Result<u64, ArchiveError> {
        Ok(read_type!(self, stream, u64))
    }

    pub fn read_bytes(&mut self, stream: &[u8], len: usize) -> Result<Vec<u8>, ArchiveError> {
        let upper_bound = self.index + len;

        if upper_bound > stream.len() {
            return Err(ArchiveError::BadArchiveStructure(format!(
                "record truncated, {:} bytes wanted at offset {:} of a {:} byte record",
                len,
                self.index,
                stream.len()
            )));
        }

        let value = stream[self.index..upper_bound].to_owned();

        self.index = upper_bound;

        Ok(value)
    }
}
