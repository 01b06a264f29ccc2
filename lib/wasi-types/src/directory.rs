use crate::Filetype;

/// A reference to the offset of a directory entry: the index of the next
/// entry to read. The value 0 signifies the start of the directory.
pub type Dircookie = u64;

pub const DIRCOOKIE_START: Dircookie = 0;

/// A directory entry header, 24 bytes on the wire, immediately followed by
/// `d_namlen` name bytes with no terminator and no padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dirent {
    /// The offset of the next directory entry stored in this directory.
    pub d_next: Dircookie,
    /// The serial number of the file referred to by this directory entry.
    pub d_ino: u64,
    /// The length of the name of the directory entry.
    pub d_namlen: u32,
    /// The type of the file referred to by this directory entry.
    pub d_type: Filetype,
}

pub const DIRENT_SIZE: u32 = 24;

pub fn dirent_to_le_bytes(ent: &Dirent) -> Vec<u8> {
    let out: Vec<u8> = std::iter::empty()
        .chain(ent.d_next.to_le_bytes())
        .chain(ent.d_ino.to_le_bytes())
        .chain(ent.d_namlen.to_le_bytes())
        .chain((ent.d_type as u32).to_le_bytes())
        .collect();

    assert_eq!(out.len(), DIRENT_SIZE as usize);
    out
}

#[cfg(test)]
mod tests {
    use super::{dirent_to_le_bytes, Dirent};
    use crate::Filetype;

    #[test]
    fn test_dirent_to_le_bytes() {
        let s = Dirent {
            d_next: 0x0123456789abcdef,
            d_ino: 0xfedcba9876543210,
            d_namlen: 0xaabbccdd,
            d_type: Filetype::Directory,
        };

        assert_eq!(
            vec![
                // d_next
                0xef, 0xcd, 0xab, 0x89, 0x67, 0x45, 0x23, 0x01,
                //
                // d_ino
                0x10, 0x32, 0x54, 0x76, 0x98, 0xba, 0xdc, 0xfe,
                //
                // d_namelen
                0xdd, 0xcc, 0xbb, 0xaa,
                //
                // d_type
                // plus padding
                0x03, 0x00, 0x00, 0x00,
            ],
            dirent_to_le_bytes(&s)
        );
    }
}
