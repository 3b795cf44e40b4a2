//! Fixture builders shared by the integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

const SHT_PROGBITS: u32 = 1;
const SHT_STRTAB: u32 = 3;
const SHF_ALLOC_EXEC: u64 = 0x6;

struct SectionHeader {
    name: u32,
    kind: u32,
    flags: u64,
    addr: u64,
    offset: u64,
    size: u64,
}

/// Build a little-endian ELF file with one allocated section per entry of
/// `sections` (address, contents)
fn elf(is_64: bool, entry: u64, sections: &[(u64, &[u8])]) -> Vec<u8> {
    let ehsize: usize = if is_64 { 64 } else { 52 };
    let shentsize: usize = if is_64 { 64 } else { 40 };

    let mut body = Vec::new();
    let mut strtab = vec![0u8];
    let mut headers = vec![SectionHeader {
        name: 0,
        kind: 0,
        flags: 0,
        addr: 0,
        offset: 0,
        size: 0,
    }];

    for (i, (addr, data)) in sections.iter().enumerate() {
        let name = strtab.len() as u32;
        strtab.extend_from_slice(format!(".s{i}\0").as_bytes());
        headers.push(SectionHeader {
            name,
            kind: SHT_PROGBITS,
            flags: SHF_ALLOC_EXEC,
            addr: *addr,
            offset: (ehsize + body.len()) as u64,
            size: data.len() as u64,
        });
        body.extend_from_slice(data);
        while body.len() % 4 != 0 {
            body.push(0);
        }
    }

    let name = strtab.len() as u32;
    strtab.extend_from_slice(b".shstrtab\0");
    headers.push(SectionHeader {
        name,
        kind: SHT_STRTAB,
        flags: 0,
        addr: 0,
        offset: (ehsize + body.len()) as u64,
        size: strtab.len() as u64,
    });
    body.extend_from_slice(&strtab);
    while body.len() % 8 != 0 {
        body.push(0);
    }

    let shoff = (ehsize + body.len()) as u64;
    let shnum = headers.len() as u16;
    let shstrndx = shnum - 1;

    let mut file = Vec::new();
    file.extend_from_slice(&[0x7f, b'E', b'L', b'F']);
    file.push(if is_64 { 2 } else { 1 });
    file.extend_from_slice(&[1, 1, 0]);
    file.extend_from_slice(&[0; 8]);
    file.extend_from_slice(&2u16.to_le_bytes());
    file.extend_from_slice(&(if is_64 { 183u16 } else { 40u16 }).to_le_bytes());
    file.extend_from_slice(&1u32.to_le_bytes());
    if is_64 {
        file.extend_from_slice(&entry.to_le_bytes());
        file.extend_from_slice(&0u64.to_le_bytes());
        file.extend_from_slice(&shoff.to_le_bytes());
    } else {
        file.extend_from_slice(&(entry as u32).to_le_bytes());
        file.extend_from_slice(&0u32.to_le_bytes());
        file.extend_from_slice(&(shoff as u32).to_le_bytes());
    }
    file.extend_from_slice(&0u32.to_le_bytes());
    file.extend_from_slice(&(ehsize as u16).to_le_bytes());
    file.extend_from_slice(&(if is_64 { 56u16 } else { 32u16 }).to_le_bytes());
    file.extend_from_slice(&0u16.to_le_bytes());
    file.extend_from_slice(&(shentsize as u16).to_le_bytes());
    file.extend_from_slice(&shnum.to_le_bytes());
    file.extend_from_slice(&shstrndx.to_le_bytes());
    assert_eq!(file.len(), ehsize);

    file.extend_from_slice(&body);

    for header in &headers {
        file.extend_from_slice(&header.name.to_le_bytes());
        file.extend_from_slice(&header.kind.to_le_bytes());
        if is_64 {
            file.extend_from_slice(&header.flags.to_le_bytes());
            file.extend_from_slice(&header.addr.to_le_bytes());
            file.extend_from_slice(&header.offset.to_le_bytes());
            file.extend_from_slice(&header.size.to_le_bytes());
            file.extend_from_slice(&0u32.to_le_bytes());
            file.extend_from_slice(&0u32.to_le_bytes());
            file.extend_from_slice(&4u64.to_le_bytes());
            file.extend_from_slice(&0u64.to_le_bytes());
        } else {
            file.extend_from_slice(&(header.flags as u32).to_le_bytes());
            file.extend_from_slice(&(header.addr as u32).to_le_bytes());
            file.extend_from_slice(&(header.offset as u32).to_le_bytes());
            file.extend_from_slice(&(header.size as u32).to_le_bytes());
            file.extend_from_slice(&0u32.to_le_bytes());
            file.extend_from_slice(&0u32.to_le_bytes());
            file.extend_from_slice(&4u32.to_le_bytes());
            file.extend_from_slice(&0u32.to_le_bytes());
        }
    }
    file
}

pub fn elf32(entry: u32, sections: &[(u32, &[u8])]) -> Vec<u8> {
    let sections: Vec<(u64, &[u8])> = sections.iter().map(|(a, d)| ((*a).into(), *d)).collect();
    elf(false, entry.into(), &sections)
}

pub fn elf64(entry: u64, sections: &[(u64, &[u8])]) -> Vec<u8> {
    elf(true, entry, sections)
}

/// Start of a Xilinx `.bit` file: magic and the design and part sections
pub fn bitstream_header() -> Vec<u8> {
    let mut file = vec![
        0x00, 0x09, 0x0f, 0xf0, 0x0f, 0xf0, 0x0f, 0xf0, 0x0f, 0xf0, 0x00, 0x00, 0x01,
    ];
    for (tag, value) in [(b'a', &b"top;UserID=0XFFFFFFFF\0"[..]), (b'b', &b"7z010clg400\0"[..])] {
        file.extend_from_slice(&[tag, 0, value.len() as u8]);
        file.extend_from_slice(value);
    }
    file
}

/// Xilinx `.bit` file with `body` as configuration data
pub fn bitstream(body: &[u8]) -> Vec<u8> {
    let mut file = bitstream_header();
    file.push(b'e');
    file.extend_from_slice(&(body.len() as u32).to_be_bytes());
    file.extend_from_slice(body);
    file
}

/// U-Boot legacy image of type `image_type` wrapping `payload`
pub fn uimage(image_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut file = Vec::with_capacity(64 + payload.len());
    for word in [
        0x2705_1956u32,
        0x1234_5678,
        0,
        payload.len() as u32,
        0x8000,
        0x8000,
        0x9ABC_DEF0,
    ] {
        file.extend_from_slice(&word.to_be_bytes());
    }
    file.extend_from_slice(&[5, 2, image_type, 0]);
    let mut name = [0u8; 32];
    name[..5].copy_from_slice(b"Linux");
    file.extend_from_slice(&name);
    file.extend_from_slice(payload);
    file
}

/// Write `data` to `dir/name`
pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

/// Little-endian word `index` of `image`
pub fn word(image: &[u8], index: usize) -> u32 {
    let bytes = &image[index * 4..index * 4 + 4];
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Words `start..end` of `image`
pub fn words(image: &[u8], start: usize, end: usize) -> Vec<u32> {
    (start..end).map(|i| word(image, i)).collect()
}
