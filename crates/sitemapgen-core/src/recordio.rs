//! Binary encoding for temp/base files (`spec.md` section 3: "Temp file
//! format", "Base file format", "Fingerprint file format").
//!
//! Records are written back to back, sorted by fingerprint ascending, with
//! no framing beyond a length-prefixed URL string. Fingerprint files are a
//! bare sequence of 16-byte little-endian fingerprints.

use sitemapgen_events::{UrlFprint, VisitingRecord};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

pub fn write_record<W: Write>(w: &mut W, r: &VisitingRecord) -> io::Result<()> {
    w.write_all(&r.fingerprint.0.to_le_bytes())?;
    w.write_all(&r.first_appear.to_le_bytes())?;
    w.write_all(&r.last_access.to_le_bytes())?;
    w.write_all(&r.last_change.to_le_bytes())?;
    w.write_all(&r.count_access.to_le_bytes())?;
    w.write_all(&r.count_change.to_le_bytes())?;
    w.write_all(&r.content_hash.to_le_bytes())?;
    w.write_all(&r.last_modified.to_le_bytes())?;
    w.write_all(&r.last_filewrite.to_le_bytes())?;
    let url_bytes = r.url.as_bytes();
    w.write_all(&(url_bytes.len() as u16).to_le_bytes())?;
    w.write_all(url_bytes)?;
    Ok(())
}

/// Reads one record, or `None` at a clean end-of-file.
pub fn read_record<R: Read>(r: &mut R) -> io::Result<Option<VisitingRecord>> {
    let mut fp_buf = [0u8; 16];
    match r.read_exact(&mut fp_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let fingerprint = UrlFprint(u128::from_le_bytes(fp_buf));

    let mut i64_buf = [0u8; 8];
    let mut read_i64 = |r: &mut R| -> io::Result<i64> {
        r.read_exact(&mut i64_buf)?;
        Ok(i64::from_le_bytes(i64_buf))
    };
    let first_appear = read_i64(r)?;
    let last_access = read_i64(r)?;
    let last_change = read_i64(r)?;

    let mut u32_buf = [0u8; 4];
    let mut read_u32 = |r: &mut R| -> io::Result<u32> {
        r.read_exact(&mut u32_buf)?;
        Ok(u32::from_le_bytes(u32_buf))
    };
    let count_access = read_u32(r)?;
    let count_change = read_u32(r)?;

    let content_hash = read_i64(r)?;
    let last_modified = read_i64(r)?;
    let last_filewrite = read_i64(r)?;

    let mut len_buf = [0u8; 2];
    r.read_exact(&mut len_buf)?;
    let len = u16::from_le_bytes(len_buf) as usize;
    let mut url_buf = vec![0u8; len];
    r.read_exact(&mut url_buf)?;
    let url = String::from_utf8_lossy(&url_buf).into_owned();

    Ok(Some(VisitingRecord {
        url,
        fingerprint,
        first_appear,
        last_access,
        last_change,
        count_access,
        count_change,
        content_hash,
        last_modified,
        last_filewrite,
    }))
}

pub fn read_all(path: &Path) -> io::Result<Vec<VisitingRecord>> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut reader = BufReader::new(file);
    let mut out = Vec::new();
    while let Some(record) = read_record(&mut reader)? {
        out.push(record);
    }
    Ok(out)
}

pub fn write_all(path: &Path, records: &[VisitingRecord]) -> io::Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    for r in records {
        write_record(&mut writer, r)?;
    }
    writer.flush()
}

pub fn write_fprints(path: &Path, fprints: &[UrlFprint]) -> io::Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    for fp in fprints {
        writer.write_all(&fp.0.to_le_bytes())?;
    }
    writer.flush()
}

pub fn read_fprints(path: &Path) -> io::Result<Vec<UrlFprint>> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut reader = BufReader::new(file);
    let mut out = Vec::new();
    loop {
        let mut buf = [0u8; 16];
        match reader.read_exact(&mut buf) {
            Ok(()) => out.push(UrlFprint(u128::from_le_bytes(buf))),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn tmp(tag: &str) -> std::path::PathBuf {
        let ts = SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("sitemapgen_recordio_{tag}_{ts}"))
    }

    #[test]
    fn roundtrip_records() {
        let path = tmp("records");
        let records = vec![
            VisitingRecord::new_seen("/a", 1, 2, 3, 100),
            VisitingRecord::new_seen("/b/long/path?x=1", -1, -1, -1, 200),
        ];
        write_all(&path, &records).unwrap();
        let back = read_all(&path).unwrap();
        assert_eq!(back, records);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_reads_empty() {
        let path = tmp("missing");
        assert_eq!(read_all(&path).unwrap(), Vec::new());
        assert_eq!(read_fprints(&path).unwrap(), Vec::new());
    }

    #[test]
    fn roundtrip_fprints() {
        let path = tmp("fprints");
        let fps = vec![UrlFprint(1), UrlFprint(2), UrlFprint(u128::MAX)];
        write_fprints(&path, &fps).unwrap();
        assert_eq!(read_fprints(&path).unwrap(), fps);
        std::fs::remove_file(&path).unwrap();
    }
}
