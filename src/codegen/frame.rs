//! StackMapTable frames (JVMS 4.7.4)
//!
//! Frames are kept in their compressed form. Relocating code only changes
//! `offset_delta` values and the offsets carried by `Uninitialized` entries;
//! the frame kinds and their locals never change.

/// VerificationTypeInfo as defined in JVMS 4.7.4
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    Object(u16),        // cpool index to CONSTANT_Class
    Uninitialized(u16), // offset of the `new` instruction
}

impl VerificationType {
    pub fn write_to(&self, bytes: &mut Vec<u8>) {
        match self {
            VerificationType::Top => bytes.push(0),
            VerificationType::Integer => bytes.push(1),
            VerificationType::Float => bytes.push(2),
            VerificationType::Double => bytes.push(3),
            VerificationType::Long => bytes.push(4),
            VerificationType::Null => bytes.push(5),
            VerificationType::UninitializedThis => bytes.push(6),
            VerificationType::Object(cp_index) => {
                bytes.push(7);
                bytes.extend_from_slice(&cp_index.to_be_bytes());
            }
            VerificationType::Uninitialized(offset) => {
                bytes.push(8);
                bytes.extend_from_slice(&offset.to_be_bytes());
            }
        }
    }
}

/// StackMapFrame variants as defined in JVMS 4.7.4
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackMapFrame {
    Same { offset_delta: u16 },
    SameLocals1StackItem { offset_delta: u16, stack: VerificationType },
    SameLocals1StackItemExtended { offset_delta: u16, stack: VerificationType },
    Chop { k: u8, offset_delta: u16 }, // k in {1,2,3}
    SameExtended { offset_delta: u16 },
    Append { offset_delta: u16, locals: Vec<VerificationType> }, // 1..=3 locals
    Full { offset_delta: u16, locals: Vec<VerificationType>, stack: Vec<VerificationType> },
}

impl StackMapFrame {
    pub fn offset_delta(&self) -> u16 {
        match self {
            StackMapFrame::Same { offset_delta }
            | StackMapFrame::SameLocals1StackItem { offset_delta, .. }
            | StackMapFrame::SameLocals1StackItemExtended { offset_delta, .. }
            | StackMapFrame::Chop { offset_delta, .. }
            | StackMapFrame::SameExtended { offset_delta }
            | StackMapFrame::Append { offset_delta, .. }
            | StackMapFrame::Full { offset_delta, .. } => *offset_delta,
        }
    }

    pub fn set_offset_delta(&mut self, delta: u16) {
        match self {
            StackMapFrame::Same { offset_delta }
            | StackMapFrame::SameLocals1StackItem { offset_delta, .. }
            | StackMapFrame::SameLocals1StackItemExtended { offset_delta, .. }
            | StackMapFrame::Chop { offset_delta, .. }
            | StackMapFrame::SameExtended { offset_delta }
            | StackMapFrame::Append { offset_delta, .. }
            | StackMapFrame::Full { offset_delta, .. } => *offset_delta = delta,
        }
    }

    /// Every verification type carried by the frame.
    pub fn types_mut(&mut self) -> Box<dyn Iterator<Item = &mut VerificationType> + '_> {
        match self {
            StackMapFrame::Same { .. } | StackMapFrame::Chop { .. } | StackMapFrame::SameExtended { .. } => {
                Box::new(std::iter::empty())
            }
            StackMapFrame::SameLocals1StackItem { stack, .. }
            | StackMapFrame::SameLocals1StackItemExtended { stack, .. } => Box::new(std::iter::once(stack)),
            StackMapFrame::Append { locals, .. } => Box::new(locals.iter_mut()),
            StackMapFrame::Full { locals, stack, .. } => Box::new(locals.iter_mut().chain(stack.iter_mut())),
        }
    }

    pub fn write_to(&self, bytes: &mut Vec<u8>) {
        match self {
            StackMapFrame::Same { offset_delta } => {
                if *offset_delta <= 63 {
                    bytes.push(*offset_delta as u8);
                } else {
                    bytes.push(251); // same_frame_extended
                    bytes.extend_from_slice(&offset_delta.to_be_bytes());
                }
            }
            StackMapFrame::SameLocals1StackItem { offset_delta, stack } => {
                if *offset_delta <= 63 {
                    bytes.push(64 + *offset_delta as u8);
                } else {
                    bytes.push(247); // same_locals_1_stack_item_frame_extended
                    bytes.extend_from_slice(&offset_delta.to_be_bytes());
                }
                stack.write_to(bytes);
            }
            StackMapFrame::SameLocals1StackItemExtended { offset_delta, stack } => {
                bytes.push(247);
                bytes.extend_from_slice(&offset_delta.to_be_bytes());
                stack.write_to(bytes);
            }
            StackMapFrame::Chop { k, offset_delta } => {
                bytes.push(251 - *k);
                bytes.extend_from_slice(&offset_delta.to_be_bytes());
            }
            StackMapFrame::SameExtended { offset_delta } => {
                bytes.push(251);
                bytes.extend_from_slice(&offset_delta.to_be_bytes());
            }
            StackMapFrame::Append { offset_delta, locals } => {
                bytes.push(251 + locals.len() as u8);
                bytes.extend_from_slice(&offset_delta.to_be_bytes());
                for l in locals {
                    l.write_to(bytes);
                }
            }
            StackMapFrame::Full { offset_delta, locals, stack } => {
                bytes.push(255);
                bytes.extend_from_slice(&offset_delta.to_be_bytes());
                bytes.extend_from_slice(&(locals.len() as u16).to_be_bytes());
                for l in locals {
                    l.write_to(bytes);
                }
                bytes.extend_from_slice(&(stack.len() as u16).to_be_bytes());
                for s in stack {
                    s.write_to(bytes);
                }
            }
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StackMapTable {
    pub frames: Vec<StackMapFrame>,
}

impl StackMapTable {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Absolute bytecode offset of each frame.
    pub fn absolute_offsets(&self) -> Vec<u32> {
        let mut offsets = Vec::with_capacity(self.frames.len());
        let mut previous: Option<u32> = None;
        for frame in &self.frames {
            let delta = frame.offset_delta() as u32;
            let offset = match previous {
                None => delta,
                Some(p) => p + delta + 1,
            };
            offsets.push(offset);
            previous = Some(offset);
        }
        offsets
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(self.frames.len() as u16).to_be_bytes());
        for f in &self.frames {
            f.write_to(&mut bytes);
        }
        bytes
    }
}

/// Convert absolute offsets back into the delta encoding.
pub fn offset_deltas(offsets: &[u32]) -> Option<Vec<u16>> {
    let mut deltas = Vec::with_capacity(offsets.len());
    let mut previous: Option<u32> = None;
    for &offset in offsets {
        let delta = match previous {
            None => offset,
            Some(p) => offset.checked_sub(p + 1)?,
        };
        deltas.push(u16::try_from(delta).ok()?);
        previous = Some(offset);
    }
    Some(deltas)
}
