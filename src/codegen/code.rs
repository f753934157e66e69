//! Editable method bodies.
//!
//! [`MethodBody::decode`] turns a `Code` attribute into an instruction list in
//! which every referenced offset is a [`Label`]: branch and switch targets,
//! exception ranges, line numbers, local-variable ranges, stack-map frames and
//! the `new` instructions named by `Uninitialized` verification types.
//! [`MethodBody::encode`] lays the list out again and rewrites all of them.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::attribute::{
    AttributeInfo, CodeAttribute, ExceptionTableEntry, LineNumberEntry, LocalVariableEntry, NamedAttribute,
};
use super::error::{ClassFormatError, ClassFormatResult, CodeError, CodeResult};
use super::frame::{offset_deltas, StackMapFrame, StackMapTable, VerificationType};
use super::insn::{decode_instructions, Insn, Label};

const MAX_CODE_LENGTH: u32 = 65535;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handler {
    pub start: Label,
    pub end: Label,
    pub handler: Label,
    pub catch_type: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRange {
    pub start: Label,
    pub end: Label,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub index: u16,
}

/// Attributes nested in `Code`, in their original order.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyAttribute {
    LineNumbers { name_index: u16, entries: Vec<(Label, u16)> },
    LocalVariables { name_index: u16, entries: Vec<LocalRange> },
    LocalVariableTypes { name_index: u16, entries: Vec<LocalRange> },
    /// Frames keep their compressed form; `Uninitialized` offsets inside them
    /// still hold original offsets and are resolved through `Label(offset)`.
    StackMap { name_index: u16, frames: Vec<(Label, StackMapFrame)> },
    Opaque(NamedAttribute),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodBody {
    pub max_stack: u16,
    pub max_locals: u16,
    pub insns: Vec<Insn>,
    pub handlers: Vec<Handler>,
    pub attributes: Vec<BodyAttribute>,
    next_label: u32,
}

struct LabelMarker {
    boundaries: HashSet<u32>,
    referenced: BTreeSet<u32>,
}

impl LabelMarker {
    fn mark(&mut self, offset: u32) -> ClassFormatResult<Label> {
        if !self.boundaries.contains(&offset) {
            return Err(ClassFormatError::BadOffset(offset));
        }
        self.referenced.insert(offset);
        Ok(Label(offset))
    }
}

impl MethodBody {
    /// A fresh body holding the given instructions and no metadata.
    pub fn from_insns(max_locals: u16, insns: Vec<Insn>) -> Self {
        Self { max_stack: 0, max_locals, insns, handlers: Vec::new(), attributes: Vec::new(), next_label: 0 }
    }

    pub fn decode(code: &CodeAttribute) -> ClassFormatResult<MethodBody> {
        let raw = decode_instructions(&code.code)?;
        let code_len = code.code.len() as u32;
        let mut boundaries: HashSet<u32> = raw.iter().map(|(offset, _)| *offset).collect();
        boundaries.insert(code_len);
        let mut marker = LabelMarker { boundaries, referenced: BTreeSet::new() };

        for (_, insn) in &raw {
            for target in insn.targets() {
                marker.mark(target.0)?;
            }
        }

        let mut handlers = Vec::with_capacity(code.exception_table.len());
        for entry in &code.exception_table {
            handlers.push(Handler {
                start: marker.mark(entry.start_pc as u32)?,
                end: marker.mark(entry.end_pc as u32)?,
                handler: marker.mark(entry.handler_pc as u32)?,
                catch_type: entry.catch_type,
            });
        }

        let mut attributes = Vec::with_capacity(code.attributes.len());
        for attribute in &code.attributes {
            let name_index = attribute.name_index;
            let decoded = match &attribute.info {
                AttributeInfo::LineNumberTable(entries) => {
                    let mut lines = Vec::with_capacity(entries.len());
                    for entry in entries {
                        lines.push((marker.mark(entry.start_pc as u32)?, entry.line_number));
                    }
                    BodyAttribute::LineNumbers { name_index, entries: lines }
                }
                AttributeInfo::LocalVariableTable(entries) => {
                    BodyAttribute::LocalVariables { name_index, entries: local_ranges(&mut marker, entries)? }
                }
                AttributeInfo::LocalVariableTypeTable(entries) => {
                    BodyAttribute::LocalVariableTypes { name_index, entries: local_ranges(&mut marker, entries)? }
                }
                AttributeInfo::StackMapTable(table) => {
                    let offsets = table.absolute_offsets();
                    let mut frames = Vec::with_capacity(table.frames.len());
                    for (frame, offset) in table.frames.iter().zip(offsets) {
                        let mut frame = frame.clone();
                        for ty in frame.types_mut() {
                            if let VerificationType::Uninitialized(new_at) = ty {
                                marker.mark(*new_at as u32)?;
                            }
                        }
                        frames.push((marker.mark(offset)?, frame));
                    }
                    BodyAttribute::StackMap { name_index, frames }
                }
                _ => BodyAttribute::Opaque(attribute.clone()),
            };
            attributes.push(decoded);
        }

        let mut insns = Vec::with_capacity(raw.len() + marker.referenced.len());
        for (offset, insn) in raw {
            if marker.referenced.contains(&offset) {
                insns.push(Insn::Label(Label(offset)));
            }
            insns.push(insn);
        }
        if marker.referenced.contains(&code_len) {
            insns.push(Insn::Label(Label(code_len)));
        }

        Ok(MethodBody {
            max_stack: code.max_stack,
            max_locals: code.max_locals,
            insns,
            handlers,
            attributes,
            next_label: code_len + 1,
        })
    }

    /// A label that no decoded offset uses.
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    /// Position of every label inside `insns`.
    pub fn label_positions(&self) -> HashMap<Label, usize> {
        self.insns
            .iter()
            .enumerate()
            .filter_map(|(i, insn)| match insn {
                Insn::Label(label) => Some((*label, i)),
                _ => None,
            })
            .collect()
    }

    /// Insert instructions ahead of everything else, including any label at
    /// the entry, so existing jumps to the first instruction skip them.
    pub fn prepend(&mut self, insns: Vec<Insn>) {
        self.insns.splice(0..0, insns);
    }

    /// Remove nested attributes that the codec does not relocate and return
    /// their name indices.
    pub fn strip_opaque_attributes(&mut self) -> Vec<u16> {
        let mut dropped = Vec::new();
        self.attributes.retain(|a| match a {
            BodyAttribute::Opaque(attribute) => {
                dropped.push(attribute.name_index);
                false
            }
            _ => true,
        });
        dropped
    }

    /// Lay the instructions out and rebuild the `Code` attribute.
    pub fn encode(&self, max_stack: u16) -> CodeResult<CodeAttribute> {
        let mut positions: HashMap<Label, u32> = HashMap::new();
        let mut pos: u32 = 0;
        for insn in &self.insns {
            if let Insn::Label(label) = insn {
                positions.insert(*label, pos);
            }
            pos += insn.encoded_len(pos);
        }
        if pos > MAX_CODE_LENGTH {
            return Err(CodeError::CodeTooLarge(pos as usize));
        }

        let resolve = |label: Label| positions.get(&label).copied().ok_or(CodeError::UnboundLabel(label.0));
        let mut code = Vec::with_capacity(pos as usize);
        for insn in &self.insns {
            let at = code.len() as u32;
            insn.encode(at, &mut code, &resolve)?;
        }

        let mut exception_table = Vec::with_capacity(self.handlers.len());
        for h in &self.handlers {
            exception_table.push(ExceptionTableEntry::new(
                resolve(h.start)? as u16,
                resolve(h.end)? as u16,
                resolve(h.handler)? as u16,
                h.catch_type,
            ));
        }

        let mut attributes = Vec::with_capacity(self.attributes.len());
        for attribute in &self.attributes {
            let encoded = match attribute {
                BodyAttribute::LineNumbers { name_index, entries } => {
                    let mut lines = Vec::with_capacity(entries.len());
                    for (label, line_number) in entries {
                        lines.push(LineNumberEntry { start_pc: resolve(*label)? as u16, line_number: *line_number });
                    }
                    NamedAttribute::new(*name_index, AttributeInfo::LineNumberTable(lines))
                }
                BodyAttribute::LocalVariables { name_index, entries } => NamedAttribute::new(
                    *name_index,
                    AttributeInfo::LocalVariableTable(encode_ranges(entries, &resolve)?),
                ),
                BodyAttribute::LocalVariableTypes { name_index, entries } => NamedAttribute::new(
                    *name_index,
                    AttributeInfo::LocalVariableTypeTable(encode_ranges(entries, &resolve)?),
                ),
                BodyAttribute::StackMap { name_index, frames } => {
                    let mut offsets = Vec::with_capacity(frames.len());
                    for (label, _) in frames {
                        offsets.push(resolve(*label)?);
                    }
                    let deltas = offset_deltas(&offsets)
                        .ok_or_else(|| CodeError::FrameOrder(offsets.last().copied().unwrap_or(0)))?;
                    let mut table = StackMapTable::new();
                    for ((_, frame), delta) in frames.iter().zip(deltas) {
                        let mut frame = frame.clone();
                        frame.set_offset_delta(delta);
                        for ty in frame.types_mut() {
                            if let VerificationType::Uninitialized(new_at) = ty {
                                *new_at = resolve(Label(*new_at as u32))? as u16;
                            }
                        }
                        table.frames.push(frame);
                    }
                    NamedAttribute::new(*name_index, AttributeInfo::StackMapTable(table))
                }
                BodyAttribute::Opaque(attribute) => attribute.clone(),
            };
            attributes.push(encoded);
        }

        Ok(CodeAttribute { max_stack, max_locals: self.max_locals, code, exception_table, attributes })
    }
}

fn local_ranges(marker: &mut LabelMarker, entries: &[LocalVariableEntry]) -> ClassFormatResult<Vec<LocalRange>> {
    let mut ranges = Vec::with_capacity(entries.len());
    for entry in entries {
        ranges.push(LocalRange {
            start: marker.mark(entry.start_pc as u32)?,
            end: marker.mark(entry.start_pc as u32 + entry.length as u32)?,
            name_index: entry.name_index,
            descriptor_index: entry.descriptor_index,
            index: entry.index,
        });
    }
    Ok(ranges)
}

fn encode_ranges<F>(ranges: &[LocalRange], resolve: &F) -> CodeResult<Vec<LocalVariableEntry>>
where
    F: Fn(Label) -> CodeResult<u32>,
{
    let mut entries = Vec::with_capacity(ranges.len());
    for range in ranges {
        let start = resolve(range.start)?;
        let end = resolve(range.end)?;
        entries.push(LocalVariableEntry {
            start_pc: start as u16,
            length: (end - start) as u16,
            name_index: range.name_index,
            descriptor_index: range.descriptor_index,
            index: range.index,
        });
    }
    Ok(entries)
}
