//! Writes minimal single-section .NET images for tests
//!
//! Only the tables the reader consults are emitted: TypeRef, TypeDef,
//! MethodDef, PropertyMap, Property and MethodSemantics.

const HEADER_SIZE: usize = 0x200;
const FILE_ALIGNMENT: usize = 0x200;
const PE_OFFSET: usize = 0x80;
const SECTION_RVA: u32 = 0x2000;
const CLI_HEADER_SIZE: usize = 72;
const OPTIONAL_HEADER_SIZE: u16 = 0xE0;

/// Instructions placed before the string loads so the reader has to decode
/// operands properly: `nop; ldc.i4 0x72727272; pop`
const IL_PREAMBLE: [u8; 7] = [0x00, 0x20, 0x72, 0x72, 0x72, 0x72, 0x26];

pub(crate) enum FixtureGetter {
    /// Getter whose body loads these strings
    Body(Vec<String>),
    /// Getter declared without a body
    Abstract,
    /// Property without a getter
    Missing,
}

pub(crate) struct FixtureProperty {
    pub(crate) name: String,
    pub(crate) getter: FixtureGetter,
}

impl FixtureProperty {
    pub(crate) fn new(name: &str, getter: FixtureGetter) -> Self {
        Self {
            name: name.to_string(),
            getter,
        }
    }
}

pub(crate) struct FixtureType {
    pub(crate) name: String,
    pub(crate) namespace: String,
    pub(crate) base_type: Option<String>,
    pub(crate) properties: Vec<FixtureProperty>,
}

#[derive(Default)]
pub(crate) struct AssemblyWriter {
    types: Vec<FixtureType>,
    fat: bool,
}

struct MethodRow {
    name: u16,
    code: Option<Vec<u8>>,
}

struct TypeDefRow {
    name: u16,
    namespace: u16,
    extends: u16,
    method_list: u16,
}

impl AssemblyWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_type(mut self, ty: FixtureType) -> Self {
        self.types.push(ty);
        self
    }

    /// Emit every method body with a fat header
    pub(crate) fn fat_bodies(mut self) -> Self {
        self.fat = true;
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let mut strings = vec![0u8];
        let mut user_strings = vec![0u8];

        let system = add_string(&mut strings, "System");
        let mut base_names: Vec<String> = Vec::new();
        for ty in &self.types {
            if let Some(base) = &ty.base_type {
                if !base_names.contains(base) {
                    base_names.push(base.clone());
                }
            }
        }
        let type_refs: Vec<u16> = base_names
            .iter()
            .map(|name| add_string(&mut strings, name))
            .collect();

        let mut type_defs = Vec::new();
        let mut methods: Vec<MethodRow> = Vec::new();
        let mut properties: Vec<u16> = Vec::new();
        let mut property_map: Vec<(u16, u16)> = Vec::new();
        let mut semantics: Vec<(u16, u16)> = Vec::new();

        for (index, ty) in self.types.iter().enumerate() {
            let type_row = (index + 1) as u16;
            let method_list = (methods.len() + 1) as u16;
            if !ty.properties.is_empty() {
                property_map.push((type_row, (properties.len() + 1) as u16));
            }

            for property in &ty.properties {
                properties.push(add_string(&mut strings, &property.name));
                let property_row = properties.len() as u16;
                let getter_name = format!("get_{}", property.name);

                let code = match &property.getter {
                    FixtureGetter::Missing => continue,
                    FixtureGetter::Abstract => None,
                    FixtureGetter::Body(values) => {
                        let mut code = IL_PREAMBLE.to_vec();
                        for value in values {
                            let token = 0x7000_0000 | add_user_string(&mut user_strings, value);
                            code.push(0x72);
                            code.extend_from_slice(&token.to_le_bytes());
                            code.push(0x26);
                        }
                        code.extend_from_slice(&[0x14, 0x2A]);
                        Some(code)
                    }
                };
                methods.push(MethodRow {
                    name: add_string(&mut strings, &getter_name),
                    code,
                });
                semantics.push((methods.len() as u16, property_row));
            }

            let extends = ty
                .base_type
                .as_ref()
                .and_then(|base| base_names.iter().position(|n| n == base))
                .map(|i| (((i + 1) as u16) << 2) | 1)
                .unwrap_or(0);

            type_defs.push(TypeDefRow {
                name: add_string(&mut strings, &ty.name),
                namespace: add_string(&mut strings, &ty.namespace),
                extends,
                method_list,
            });
        }

        // Section: CLI header, method bodies, metadata
        let mut section = vec![0u8; CLI_HEADER_SIZE];
        let mut method_rvas = vec![0u32; methods.len()];
        for (i, method) in methods.iter().enumerate() {
            if let Some(code) = &method.code {
                align(&mut section, 4);
                method_rvas[i] = SECTION_RVA + section.len() as u32;
                if self.fat || code.len() >= 64 {
                    push_u16(&mut section, 0x3003);
                    push_u16(&mut section, 8);
                    push_u32(&mut section, code.len() as u32);
                    push_u32(&mut section, 0);
                } else {
                    section.push(((code.len() as u8) << 2) | 0x2);
                }
                section.extend_from_slice(code);
            }
        }
        align(&mut section, 4);

        let mut tables = Vec::new();
        push_u32(&mut tables, 0);
        tables.extend_from_slice(&[2, 0, 0, 1]);

        let counts = [
            (0x01usize, type_refs.len()),
            (0x02, type_defs.len()),
            (0x06, methods.len()),
            (0x15, property_map.len()),
            (0x17, properties.len()),
            (0x18, semantics.len()),
        ];
        let valid = counts
            .iter()
            .filter(|(_, rows)| *rows > 0)
            .fold(0u64, |acc, (table, _)| acc | (1u64 << table));
        push_u64(&mut tables, valid);
        push_u64(&mut tables, 0);
        for (_, rows) in counts.iter().filter(|(_, rows)| *rows > 0) {
            push_u32(&mut tables, *rows as u32);
        }

        for name in &type_refs {
            push_u16(&mut tables, 0);
            push_u16(&mut tables, *name);
            push_u16(&mut tables, system);
        }
        for row in &type_defs {
            push_u32(&mut tables, 0x0010_0001);
            push_u16(&mut tables, row.name);
            push_u16(&mut tables, row.namespace);
            push_u16(&mut tables, row.extends);
            push_u16(&mut tables, 1);
            push_u16(&mut tables, row.method_list);
        }
        for (method, rva) in methods.iter().zip(&method_rvas) {
            push_u32(&mut tables, *rva);
            push_u16(&mut tables, 0);
            push_u16(&mut tables, 0x0886);
            push_u16(&mut tables, method.name);
            push_u16(&mut tables, 0);
            push_u16(&mut tables, 1);
        }
        for (parent, list) in &property_map {
            push_u16(&mut tables, *parent);
            push_u16(&mut tables, *list);
        }
        for name in &properties {
            push_u16(&mut tables, 0);
            push_u16(&mut tables, *name);
            push_u16(&mut tables, 0);
        }
        for (method, property) in &semantics {
            push_u16(&mut tables, 0x0002);
            push_u16(&mut tables, *method);
            push_u16(&mut tables, (*property << 1) | 1);
        }
        align(&mut tables, 4);
        align(&mut strings, 4);
        align(&mut user_strings, 4);

        let metadata = metadata_root(&[
            ("#~", tables),
            ("#Strings", strings),
            ("#US", user_strings),
        ]);
        let metadata_rva = SECTION_RVA + section.len() as u32;
        section.extend_from_slice(&metadata);

        // CLI header
        section[0..4].copy_from_slice(&(CLI_HEADER_SIZE as u32).to_le_bytes());
        section[4..6].copy_from_slice(&2u16.to_le_bytes());
        section[6..8].copy_from_slice(&5u16.to_le_bytes());
        section[8..12].copy_from_slice(&metadata_rva.to_le_bytes());
        section[12..16].copy_from_slice(&(metadata.len() as u32).to_le_bytes());
        section[16..20].copy_from_slice(&1u32.to_le_bytes());

        let virtual_size = section.len() as u32;
        align(&mut section, FILE_ALIGNMENT);
        pe_image(section, virtual_size)
    }
}

fn metadata_root(streams: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let version = b"v4.0.30319\0\0";
    let headers_size: usize = streams
        .iter()
        .map(|(name, _)| 8 + ((name.len() + 1 + 3) & !3))
        .sum();

    let mut out = Vec::new();
    push_u32(&mut out, 0x424A_5342);
    push_u16(&mut out, 1);
    push_u16(&mut out, 1);
    push_u32(&mut out, 0);
    push_u32(&mut out, version.len() as u32);
    out.extend_from_slice(version);
    push_u16(&mut out, 0);
    push_u16(&mut out, streams.len() as u16);

    let mut offset = out.len() + headers_size;
    for (name, data) in streams {
        push_u32(&mut out, offset as u32);
        push_u32(&mut out, data.len() as u32);
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        align(&mut out, 4);
        offset += data.len();
    }
    for (_, data) in streams {
        out.extend_from_slice(data);
    }
    out
}

fn pe_image(section: Vec<u8>, virtual_size: u32) -> Vec<u8> {
    let mut image = vec![0u8; HEADER_SIZE];
    image[0] = b'M';
    image[1] = b'Z';
    put_u32(&mut image, 0x3C, PE_OFFSET as u32);

    image[PE_OFFSET..PE_OFFSET + 4].copy_from_slice(b"PE\0\0");
    let coff = PE_OFFSET + 4;
    put_u16(&mut image, coff, 0x014C);
    put_u16(&mut image, coff + 2, 1);
    put_u16(&mut image, coff + 16, OPTIONAL_HEADER_SIZE);
    put_u16(&mut image, coff + 18, 0x2102);

    let optional = coff + 20;
    put_u16(&mut image, optional, 0x10B);
    put_u32(&mut image, optional + 92, 16);
    let cli_directory = optional + 96 + 14 * 8;
    put_u32(&mut image, cli_directory, SECTION_RVA);
    put_u32(&mut image, cli_directory + 4, CLI_HEADER_SIZE as u32);

    let section_header = optional + OPTIONAL_HEADER_SIZE as usize;
    image[section_header..section_header + 5].copy_from_slice(b".text");
    put_u32(&mut image, section_header + 8, virtual_size);
    put_u32(&mut image, section_header + 12, SECTION_RVA);
    put_u32(&mut image, section_header + 16, section.len() as u32);
    put_u32(&mut image, section_header + 20, HEADER_SIZE as u32);

    image.extend_from_slice(&section);
    image
}

fn add_string(heap: &mut Vec<u8>, value: &str) -> u16 {
    if value.is_empty() {
        return 0;
    }
    let index = heap.len() as u16;
    heap.extend_from_slice(value.as_bytes());
    heap.push(0);
    index
}

fn add_user_string(heap: &mut Vec<u8>, value: &str) -> u32 {
    let index = heap.len() as u32;
    let units: Vec<u16> = value.encode_utf16().collect();
    let len = units.len() * 2 + 1;
    if len < 0x80 {
        heap.push(len as u8);
    } else {
        heap.push(0x80 | (len >> 8) as u8);
        heap.push((len & 0xFF) as u8);
    }
    for unit in units {
        heap.extend_from_slice(&unit.to_le_bytes());
    }
    heap.push(0);
    index
}

fn align(buf: &mut Vec<u8>, to: usize) {
    while buf.len() % to != 0 {
        buf.push(0);
    }
}

fn push_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}
