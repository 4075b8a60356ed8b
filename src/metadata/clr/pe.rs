//! PE/COFF container: just enough to find the CLI metadata and map RVAs

use super::bytes::{read_u16, read_u32, slice};
use crate::core::{RmuError, RmuResult};

const DOS_SIGNATURE: u16 = 0x5A4D; // "MZ"
const NT_SIGNATURE: u32 = 0x0000_4550; // "PE\0\0"
const PE32_MAGIC: u16 = 0x10B;
const PE32_PLUS_MAGIC: u16 = 0x20B;
const CLI_HEADER_DIRECTORY: usize = 14;
const SECTION_HEADER_SIZE: usize = 40;

#[derive(Debug, Clone)]
pub(crate) struct Section {
    virtual_address: u32,
    virtual_size: u32,
    raw_size: u32,
    raw_offset: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct PeImage {
    sections: Vec<Section>,
    pub(crate) metadata_offset: usize,
    pub(crate) metadata_size: usize,
}

impl PeImage {
    pub(crate) fn parse(data: &[u8]) -> RmuResult<Self> {
        if data.len() < 0x40 || read_u16(data, 0)? != DOS_SIGNATURE {
            return Err(RmuError::Parse("missing MZ signature".to_string()));
        }

        let pe_offset = read_u32(data, 0x3C)? as usize;
        if read_u32(data, pe_offset)? != NT_SIGNATURE {
            return Err(RmuError::Parse("missing PE signature".to_string()));
        }

        let coff = pe_offset + 4;
        let section_count = read_u16(data, coff + 2)? as usize;
        let optional_size = read_u16(data, coff + 16)? as usize;
        let optional = coff + 20;

        let (count_field, directories) = match read_u16(data, optional)? {
            PE32_MAGIC => (92, 96),
            PE32_PLUS_MAGIC => (108, 112),
            other => {
                return Err(RmuError::Parse(format!(
                    "unknown optional header magic {:#x}",
                    other
                )))
            }
        };

        let directory_count = read_u32(data, optional + count_field)? as usize;
        if directory_count <= CLI_HEADER_DIRECTORY {
            return Err(RmuError::Parse("not a .NET assembly".to_string()));
        }
        let cli_rva = read_u32(data, optional + directories + CLI_HEADER_DIRECTORY * 8)?;
        if cli_rva == 0 {
            return Err(RmuError::Parse("not a .NET assembly".to_string()));
        }

        let table = optional + optional_size;
        let sections = (0..section_count)
            .map(|i| {
                let header = table + i * SECTION_HEADER_SIZE;
                Ok(Section {
                    virtual_size: read_u32(data, header + 8)?,
                    virtual_address: read_u32(data, header + 12)?,
                    raw_size: read_u32(data, header + 16)?,
                    raw_offset: read_u32(data, header + 20)?,
                })
            })
            .collect::<RmuResult<Vec<_>>>()?;

        let mut image = Self {
            sections,
            metadata_offset: 0,
            metadata_size: 0,
        };

        let cli = image.rva_to_offset(cli_rva)?;
        let metadata_rva = read_u32(data, cli + 8)?;
        let metadata_size = read_u32(data, cli + 12)? as usize;
        let metadata_offset = image.rva_to_offset(metadata_rva)?;
        slice(data, metadata_offset, metadata_size)?;

        image.metadata_offset = metadata_offset;
        image.metadata_size = metadata_size;
        Ok(image)
    }

    /// Map a relative virtual address to a file offset
    pub(crate) fn rva_to_offset(&self, rva: u32) -> RmuResult<usize> {
        let rva = u64::from(rva);
        for section in &self.sections {
            let start = u64::from(section.virtual_address);
            let extent = u64::from(section.virtual_size.max(section.raw_size));
            if rva >= start && rva < start + extent {
                let delta = rva - start;
                if delta >= u64::from(section.raw_size) {
                    break;
                }
                return Ok((u64::from(section.raw_offset) + delta) as usize);
            }
        }
        Err(RmuError::Parse(format!(
            "RVA {:#x} is not backed by file data",
            rva
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_pe() {
        let result = PeImage::parse(b"this is definitely not a portable executable, just text......");
        assert!(matches!(result, Err(RmuError::Parse(_))));
    }

    #[test]
    fn test_rejects_short_input() {
        assert!(PeImage::parse(b"MZ").is_err());
    }

    #[test]
    fn test_rejects_bad_pe_offset() {
        let mut data = vec![0u8; 0x40];
        data[0] = b'M';
        data[1] = b'Z';
        data[0x3C..0x40].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());
        assert!(matches!(PeImage::parse(&data), Err(RmuError::Parse(_))));
    }

    #[test]
    fn test_rva_mapping() {
        let image = PeImage {
            sections: vec![Section {
                virtual_address: 0x2000,
                virtual_size: 0x100,
                raw_size: 0x200,
                raw_offset: 0x400,
            }],
            metadata_offset: 0,
            metadata_size: 0,
        };
        assert_eq!(image.rva_to_offset(0x2000).unwrap(), 0x400);
        assert_eq!(image.rva_to_offset(0x2010).unwrap(), 0x410);
        assert!(image.rva_to_offset(0x1000).is_err());
        assert!(image.rva_to_offset(0x2200).is_err());
    }
}
