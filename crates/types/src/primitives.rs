use crate::SerializeField;

impl SerializeField for u8 {
    fn serialize_field(&self, buf: &mut [u8], offset: &mut usize) {
        if *offset < buf.len() {
            buf[*offset] = *self;
            *offset += 1;
        }
    }
}

impl SerializeField for u16 {
    fn serialize_field(&self, buf: &mut [u8], offset: &mut usize) {
        let bytes = self.to_le_bytes();
        if *offset + 2 <= buf.len() {
            buf[*offset..*offset + 2].copy_from_slice(&bytes);
            *offset += 2;
        }
    }
}

impl SerializeField for [u8] {
    fn serialize_field(&self, buf: &mut [u8], offset: &mut usize) {
        let n = self.len();
        if *offset + n <= buf.len() {
            buf[*offset..*offset + n].copy_from_slice(self);
            *offset += n;
        }
    }
}
