#[cfg(test)]
pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&std::path::Path) -> R,
{
    static HOME_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    let _guard = HOME_MUTEX
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    // SAFETY: HOME is only touched by tests holding HOME_MUTEX.
    unsafe { std::env::set_var("HOME", dir.path()) };
    let result = func(dir.path());
    unsafe {
        if let Some(old) = old_home {
            std::env::set_var("HOME", old);
        } else {
            std::env::remove_var("HOME");
        }
    }
    result
}

#[cfg(test)]
pub(crate) fn sample_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb(color));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode sample png");
    bytes
}

#[cfg(test)]
pub(crate) fn noisy_png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_fn(width, height, |x, y| {
        let seed = x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503);
        image::Rgb([seed as u8, (seed >> 8) as u8, (seed >> 16) as u8])
    });
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode noisy png");
    bytes
}

#[cfg(test)]
pub(crate) const LATIN_FAMILY: &str = "Overlay Test Latin";

#[cfg(test)]
pub(crate) const CYRILLIC_FAMILY: &str = "Overlay Test Cyrillic";

/// Printable ASCII: space advances 250 units, everything else 500.
#[cfg(test)]
pub(crate) fn latin_font() -> Vec<u8> {
    fixture_font(LATIN_FAMILY, &[(' ', ' ', 250), ('!', '~', 500)])
}

/// Printable ASCII plus the Cyrillic block at 600 units.
#[cfg(test)]
pub(crate) fn cyrillic_font() -> Vec<u8> {
    fixture_font(
        CYRILLIC_FAMILY,
        &[(' ', ' ', 250), ('!', '~', 500), ('\u{400}', '\u{4FF}', 600)],
    )
}

/// Minimal TrueType font with 1000 units per em, ascender 800 and
/// descender -200. Every character of `ranges` maps to a solid box glyph
/// (empty for whitespace) spanning 0..700 units vertically and inset 50
/// units from both sides of its advance.
#[cfg(test)]
pub(crate) fn fixture_font(family: &str, ranges: &[(char, char, u16)]) -> Vec<u8> {
    fn u16_be(out: &mut Vec<u8>, value: u16) {
        out.extend_from_slice(&value.to_be_bytes());
    }
    fn i16_be(out: &mut Vec<u8>, value: i16) {
        out.extend_from_slice(&value.to_be_bytes());
    }
    fn u32_be(out: &mut Vec<u8>, value: u32) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    let mut glyphs: Vec<(u16, bool)> = vec![(500, false)];
    let mut segments: Vec<(u16, u16, u16)> = Vec::new();
    for &(start, end, advance) in ranges {
        let first = glyphs.len() as u16;
        for code in start as u32..=end as u32 {
            let blank = char::from_u32(code).is_some_and(char::is_whitespace);
            glyphs.push((advance, blank));
        }
        segments.push((start as u16, end as u16, first));
    }
    let count = glyphs.len() as u16;
    let max_advance = glyphs.iter().map(|(advance, _)| *advance).max().unwrap_or(500);

    let mut glyf = Vec::new();
    let mut loca = Vec::new();
    u16_be(&mut loca, 0);
    for &(advance, blank) in &glyphs {
        if !blank {
            let advance = advance as i16;
            for value in [1, 50, 0, advance - 50, 700] {
                i16_be(&mut glyf, value);
            }
            u16_be(&mut glyf, 3);
            u16_be(&mut glyf, 0);
            glyf.extend_from_slice(&[1, 1, 1, 1]);
            for value in [50, 0, advance - 100, 0, 0, 700, 0, -700] {
                i16_be(&mut glyf, value);
            }
        }
        u16_be(&mut loca, (glyf.len() / 2) as u16);
    }

    let mut head = Vec::new();
    for value in [0x10000, 0x10000, 0, 0x5F0F_3CF5] {
        u32_be(&mut head, value);
    }
    u16_be(&mut head, 0x000B);
    u16_be(&mut head, 1000);
    head.extend_from_slice(&[0; 16]);
    for value in [0, -200, max_advance as i16, 800] {
        i16_be(&mut head, value);
    }
    u16_be(&mut head, 0);
    u16_be(&mut head, 8);
    for value in [2, 0, 0] {
        i16_be(&mut head, value);
    }

    let mut hhea = Vec::new();
    u32_be(&mut hhea, 0x10000);
    for value in [800, -200, 0] {
        i16_be(&mut hhea, value);
    }
    u16_be(&mut hhea, max_advance);
    for value in [0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0] {
        i16_be(&mut hhea, value);
    }
    u16_be(&mut hhea, count);

    let mut maxp = Vec::new();
    u32_be(&mut maxp, 0x10000);
    for value in [count, 4, 1, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0] {
        u16_be(&mut maxp, value);
    }

    let mut hmtx = Vec::new();
    for &(advance, blank) in &glyphs {
        u16_be(&mut hmtx, advance);
        i16_be(&mut hmtx, if blank { 0 } else { 50 });
    }

    segments.push((0xFFFF, 0xFFFF, 0));
    let seg_count = segments.len() as u16;
    let mut search_range = 1u16;
    let mut entry_selector = 0u16;
    while search_range * 2 <= seg_count {
        search_range *= 2;
        entry_selector += 1;
    }
    search_range *= 2;
    let last = segments.len() - 1;
    let mut subtable = Vec::new();
    u16_be(&mut subtable, 4);
    u16_be(&mut subtable, 16 + 8 * seg_count);
    u16_be(&mut subtable, 0);
    u16_be(&mut subtable, seg_count * 2);
    u16_be(&mut subtable, search_range);
    u16_be(&mut subtable, entry_selector);
    u16_be(&mut subtable, seg_count * 2 - search_range);
    for &(_, end, _) in &segments {
        u16_be(&mut subtable, end);
    }
    u16_be(&mut subtable, 0);
    for &(start, _, _) in &segments {
        u16_be(&mut subtable, start);
    }
    for (idx, &(start, _, first)) in segments.iter().enumerate() {
        let delta = if idx == last { 1 } else { first.wrapping_sub(start) };
        u16_be(&mut subtable, delta);
    }
    for _ in &segments {
        u16_be(&mut subtable, 0);
    }
    let mut cmap = Vec::new();
    for value in [0, 1, 3, 1] {
        u16_be(&mut cmap, value);
    }
    u32_be(&mut cmap, 12);
    cmap.extend_from_slice(&subtable);

    let postscript = format!("{}-Regular", family.replace(' ', ""));
    let full_name = format!("{} Regular", family);
    let names: [(u16, &str); 4] = [
        (1, family),
        (2, "Regular"),
        (4, full_name.as_str()),
        (6, postscript.as_str()),
    ];
    let mut records = Vec::new();
    let mut strings = Vec::new();
    for (name_id, text) in names {
        let encoded: Vec<u8> = text.encode_utf16().flat_map(u16::to_be_bytes).collect();
        for value in [3, 1, 0x409, name_id, encoded.len() as u16, strings.len() as u16] {
            u16_be(&mut records, value);
        }
        strings.extend_from_slice(&encoded);
    }
    let mut name = Vec::new();
    u16_be(&mut name, 0);
    u16_be(&mut name, names.len() as u16);
    u16_be(&mut name, 6 + 12 * names.len() as u16);
    name.extend_from_slice(&records);
    name.extend_from_slice(&strings);

    let mut post = Vec::new();
    u32_be(&mut post, 0x30000);
    u32_be(&mut post, 0);
    i16_be(&mut post, -100);
    i16_be(&mut post, 50);
    post.extend_from_slice(&[0; 20]);

    let tables: [(&[u8; 4], Vec<u8>); 9] = [
        (b"cmap", cmap),
        (b"glyf", glyf),
        (b"head", head),
        (b"hhea", hhea),
        (b"hmtx", hmtx),
        (b"loca", loca),
        (b"maxp", maxp),
        (b"name", name),
        (b"post", post),
    ];
    let mut font = Vec::new();
    u32_be(&mut font, 0x10000);
    for value in [9, 128, 3, 16] {
        u16_be(&mut font, value);
    }
    let mut offset = 12 + 16 * tables.len();
    let mut data = Vec::new();
    for (tag, table) in &tables {
        let mut padded = table.clone();
        padded.resize(table.len().div_ceil(4) * 4, 0);
        let checksum = padded
            .chunks_exact(4)
            .map(|word| u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
            .fold(0u32, u32::wrapping_add);
        font.extend_from_slice(*tag);
        u32_be(&mut font, checksum);
        u32_be(&mut font, offset as u32);
        u32_be(&mut font, table.len() as u32);
        offset += padded.len();
        data.extend_from_slice(&padded);
    }
    font.extend_from_slice(&data);
    font
}
