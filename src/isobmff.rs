//! ISO base media file format box tree.
//!
//! Parses a box-structured buffer (MP4, fragmented MP4) into a navigable
//! tree and serializes a tree back to bytes. Leaf payloads are zero-copy
//! views of the parsed buffer.

use crate::error::{Error, Result};
use crate::metadata::FourCc;
use bytes::{BufMut, Bytes, BytesMut};

/// Boxes whose payload is a plain sequence of child boxes.
const CONTAINER_BOXES: [&[u8; 4]; 11] = [
    b"moov", b"trak", b"mdia", b"minf", b"stbl", b"moof", b"traf", b"mvex", b"dinf", b"edts",
    b"udta",
];

/// Check whether a box type is descended into when parsing.
pub fn is_container(box_type: FourCc) -> bool {
    CONTAINER_BOXES.iter().any(|code| **code == box_type.0)
}

/// How a box encoded its size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeForm {
    /// 32-bit size field.
    #[default]
    Compact,
    /// `size == 1` followed by a 64-bit size.
    Large,
    /// `size == 0`: the box extends to the end of its parent.
    ToEnd,
}

/// A parsed box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxNode {
    /// Box type.
    pub box_type: FourCc,
    /// Payload of a leaf box; empty for containers.
    pub payload: Bytes,
    /// Children of a container box.
    pub children: Vec<BoxNode>,
    /// Size encoding to use when writing.
    pub size_form: SizeForm,
}

impl BoxNode {
    /// Create a leaf box.
    pub fn leaf(box_type: FourCc, payload: impl Into<Bytes>) -> Self {
        Self {
            box_type,
            payload: payload.into(),
            children: Vec::new(),
            size_form: SizeForm::Compact,
        }
    }

    /// Create a container box.
    pub fn container(box_type: FourCc, children: Vec<BoxNode>) -> Self {
        Self {
            box_type,
            payload: Bytes::new(),
            children,
            size_form: SizeForm::Compact,
        }
    }

    /// Find every box of `box_type` below this one.
    ///
    /// Matched boxes are not searched further.
    pub fn find_sub_boxes(&self, box_type: FourCc) -> Vec<&BoxNode> {
        find_boxes(&self.children, box_type)
    }

    /// Serialized size, header included.
    pub fn size(&self) -> u64 {
        let content = self.content_len();
        content + self.header_len(content) as u64
    }

    fn content_len(&self) -> u64 {
        if self.children.is_empty() {
            self.payload.len() as u64
        } else {
            self.children.iter().map(BoxNode::size).sum()
        }
    }

    fn header_len(&self, content: u64) -> usize {
        if self.size_form == SizeForm::Large || content + 8 > u32::MAX as u64 {
            16
        } else {
            8
        }
    }

    fn write_into(&self, out: &mut BytesMut) {
        let content = self.content_len();
        let header = self.header_len(content);
        let size = content + header as u64;

        match (header, self.size_form) {
            (16, _) => {
                out.put_u32(1);
                out.put_slice(&self.box_type.0);
                out.put_u64(size);
            }
            (_, SizeForm::ToEnd) => {
                out.put_u32(0);
                out.put_slice(&self.box_type.0);
            }
            _ => {
                out.put_u32(size as u32);
                out.put_slice(&self.box_type.0);
            }
        }

        if self.children.is_empty() {
            out.put_slice(&self.payload);
        } else {
            for child in &self.children {
                child.write_into(out);
            }
        }
    }
}

/// Find every box of `box_type` in a forest, depth-first.
pub fn find_boxes(nodes: &[BoxNode], box_type: FourCc) -> Vec<&BoxNode> {
    let mut found = Vec::new();
    for node in nodes {
        if node.box_type == box_type {
            found.push(node);
        } else {
            found.extend(find_boxes(&node.children, box_type));
        }
    }
    found
}

/// Parse a buffer into a box forest.
pub fn parse_boxes(data: &Bytes) -> Result<Vec<BoxNode>> {
    let mut boxes = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        let remaining = data.len() - pos;
        if remaining < 8 {
            return Err(Error::Container(format!(
                "truncated box header at offset {}",
                pos
            )));
        }
        let size32 = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
        let box_type = FourCc([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]);

        let (header_len, size, size_form) = match size32 {
            1 => {
                if remaining < 16 {
                    return Err(Error::Container(format!(
                        "truncated large-size header of '{}' at offset {}",
                        box_type, pos
                    )));
                }
                let mut large = [0u8; 8];
                large.copy_from_slice(&data[pos + 8..pos + 16]);
                (16, u64::from_be_bytes(large), SizeForm::Large)
            }
            0 => (8, remaining as u64, SizeForm::ToEnd),
            size => (8, size as u64, SizeForm::Compact),
        };

        if size < header_len as u64 || size > remaining as u64 {
            return Err(Error::Container(format!(
                "box '{}' at offset {} claims {} bytes, {} available",
                box_type, pos, size, remaining
            )));
        }

        let end = pos + size as usize;
        let body = data.slice(pos + header_len..end);
        let node = if is_container(box_type) {
            BoxNode {
                box_type,
                payload: Bytes::new(),
                children: parse_boxes(&body)?,
                size_form,
            }
        } else {
            BoxNode {
                box_type,
                payload: body,
                children: Vec::new(),
                size_form,
            }
        };
        boxes.push(node);
        pos = end;
    }

    Ok(boxes)
}

/// Serialize a box forest.
pub fn write_boxes(nodes: &[BoxNode]) -> Bytes {
    let total: u64 = nodes.iter().map(BoxNode::size).sum();
    let mut out = BytesMut::with_capacity(total as usize);
    for node in nodes {
        node.write_into(&mut out);
    }
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_box(box_type: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(box_type);
        out.extend_from_slice(body);
        out
    }

    fn sample_file() -> Vec<u8> {
        let tkhd = raw_box(b"tkhd", &[0; 12]);
        let trak = raw_box(b"trak", &tkhd);
        let mut moov_body = raw_box(b"mvhd", &[1; 8]);
        moov_body.extend(trak);

        let mut file = raw_box(b"ftyp", b"isom\0\0\0\0");
        file.extend(raw_box(b"moov", &moov_body));
        file.extend(raw_box(b"mdat", &[0xaa; 5]));
        file
    }

    #[test]
    fn test_parse_tree() {
        let data = Bytes::from(sample_file());
        let boxes = parse_boxes(&data).unwrap();

        assert_eq!(boxes.len(), 3);
        assert_eq!(boxes[0].box_type, FourCc(*b"ftyp"));
        assert_eq!(&boxes[0].payload[..4], b"isom");
        assert_eq!(boxes[1].children.len(), 2);
        assert_eq!(boxes[1].children[1].children[0].box_type, FourCc(*b"tkhd"));
        assert_eq!(&boxes[2].payload[..], &[0xaa; 5]);
    }

    #[test]
    fn test_find_sub_boxes() {
        let data = Bytes::from(sample_file());
        let boxes = parse_boxes(&data).unwrap();

        let moov = &boxes[1];
        assert_eq!(moov.find_sub_boxes(FourCc(*b"tkhd")).len(), 1);
        assert_eq!(moov.find_sub_boxes(FourCc(*b"trak")).len(), 1);
        assert!(moov.find_sub_boxes(FourCc(*b"mdat")).is_empty());
        assert_eq!(find_boxes(&boxes, FourCc(*b"mvhd")).len(), 1);
    }

    #[test]
    fn test_write_round_trip() {
        let data = Bytes::from(sample_file());
        let boxes = parse_boxes(&data).unwrap();
        assert_eq!(write_boxes(&boxes), data);
    }

    #[test]
    fn test_large_size_and_to_end() {
        let mut data = vec![0, 0, 0, 1];
        data.extend_from_slice(b"free");
        data.extend_from_slice(&20u64.to_be_bytes());
        data.extend_from_slice(&[7; 4]);
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(b"mdat");
        data.extend_from_slice(&[9; 3]);
        let data = Bytes::from(data);

        let boxes = parse_boxes(&data).unwrap();
        assert_eq!(boxes[0].size_form, SizeForm::Large);
        assert_eq!(&boxes[0].payload[..], &[7; 4]);
        assert_eq!(boxes[1].size_form, SizeForm::ToEnd);
        assert_eq!(&boxes[1].payload[..], &[9; 3]);
        assert_eq!(write_boxes(&boxes), data);
    }

    #[test]
    fn test_truncated_boxes_rejected() {
        assert!(parse_boxes(&Bytes::from_static(&[0, 0, 0, 16, b'f', b'r'])).is_err());
        assert!(parse_boxes(&Bytes::from_static(&[0, 0, 0, 64, b'f', b'r', b'e', b'e'])).is_err());
        assert!(parse_boxes(&Bytes::from_static(&[0, 0, 0, 4, b'f', b'r', b'e', b'e'])).is_err());
    }

    #[test]
    fn test_build_and_write() {
        let tree = vec![BoxNode::container(
            FourCc(*b"moov"),
            vec![BoxNode::leaf(FourCc(*b"mvhd"), vec![0u8; 4])],
        )];
        let bytes = write_boxes(&tree);
        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[..8], &[0, 0, 0, 20, b'm', b'o', b'o', b'v']);
        assert_eq!(parse_boxes(&bytes).unwrap(), tree);
    }
}
