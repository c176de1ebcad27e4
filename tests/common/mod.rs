//! Synthetic cartridge images shared by the integration tests

#![allow(dead_code)]

use nitro_modkit::core::nitro::banner::Language;
use nitro_modkit::core::nitro::{FileSystem, OverlayEntry, DATA_FOLDER, SYSTEM_FOLDER};
use nitro_modkit::{Banner, Folder, GameFile, Header, Rom};

pub const ROM_NAME: &str = "game.nds";

/// System folder with both segments and the given overlay payloads
pub fn system_folder(overlays9: &[(u32, Vec<u8>)], overlays7: &[(u32, Vec<u8>)]) -> Folder {
    let mut system = Folder::new(SYSTEM_FOLDER);
    system.add_file(GameFile::new("arm9.bin", vec![0x99; 0x180]));
    system.add_file(GameFile::new("arm7.bin", vec![0x77; 0x40]));

    for (name, overlays) in [("overlay9", overlays9), ("overlay7", overlays7)] {
        let mut folder = Folder::new(name);
        for (id, payload) in overlays {
            folder.add_file(GameFile::new(
                format!("overlay_{:04}.bin", id),
                payload.clone(),
            ));
        }
        system.add_folder(folder);
    }
    system
}

/// `data` with `a` (100 x 0x41) and `b` (200 x 0x42)
pub fn simple_data() -> Folder {
    let mut data = Folder::new(DATA_FOLDER);
    data.add_file(GameFile::new("a", vec![0x41; 100]));
    data.add_file(GameFile::new("b", vec![0x42; 200]));
    data
}

/// A deeper tree with an empty folder
pub fn nested_data() -> Folder {
    let mut data = Folder::new(DATA_FOLDER);
    data.add_file(GameFile::new("readme.txt", b"nitro".to_vec()));

    let mut script = Folder::new("script");
    for i in 0..3u8 {
        script.add_file(GameFile::new(format!("s{:02}.bin", i), vec![i; 0x123 + i as usize]));
    }
    let mut movie = Folder::new("movie");
    let mut subs = Folder::new("subs");
    let mut es = Folder::new("es");
    es.add_file(GameFile::new("s01.xml", vec![0x3C; 0x40]));
    subs.add_folder(es);
    movie.add_folder(subs);
    movie.add_folder(Folder::new("empty"));

    data.add_folder(script);
    data.add_folder(movie);
    data
}

pub fn sample_header() -> Header {
    let mut header = Header::new();
    header.set_title("MODKITTEST");
    header.game_code = *b"NTRJ";
    header.maker_code = *b"01";
    header
}

pub fn sample_banner() -> Banner {
    let mut banner = Banner::new(2);
    banner.icon = [0x5A; 0x200];
    banner
        .set_title(Language::English, "Modkit Test\nSynthetic image")
        .unwrap();
    banner.update_crc();
    banner
}

/// Assemble a ready-to-write image file
pub fn assemble(data: Folder) -> GameFile {
    let mut fs = FileSystem::new();
    fs.arm9.entry_address = 0x0200_0800;
    fs.arm9.ram_address = 0x0200_0000;
    fs.arm7.entry_address = 0x0238_0000;
    fs.arm7.ram_address = 0x0238_0000;
    fs.arm9.unknown_tail = vec![0x21, 0x06, 0xC0, 0xDE];

    let mut ov = OverlayEntry::new(0);
    ov.ram_address = 0x0210_0000;
    ov.ram_size = 0x30;
    fs.overlays9.entries.push(ov);
    fs.overlays9.entries.push(OverlayEntry::new(1));

    let system = system_folder(&[(0, vec![0x0A; 0x30]), (1, vec![0x0B; 0x210])], &[]);
    Rom::assemble(ROM_NAME, sample_header(), sample_banner(), fs, data, system)
}

/// Encoded image bytes
pub fn build_image(data: Folder) -> Vec<u8> {
    let mut rom = assemble(data);
    rom.write_format().unwrap();
    rom.data().as_slice().to_vec()
}

/// Unpack image bytes with a fresh codec
pub fn load(image: Vec<u8>) -> GameFile {
    let mut file = GameFile::new(ROM_NAME, image).with_format(Box::new(Rom::new()));
    file.read_format().unwrap();
    file
}

pub fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
