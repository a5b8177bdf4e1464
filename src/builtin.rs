//! Built-in transforms and pipelines available from the command line

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read, Write};

use crate::error::Result;
use crate::job::{IntoUnit, Merge, Rename, Sequence, Transform, UnitRef};
use crate::recipe::Registry;

/// Copy `source` to `target` unchanged
pub fn copy() -> Result<UnitRef> {
    Transform::builder("copy")
        .input("source")
        .output("target")
        .script(|files| {
            let mut reader = files.input("source")?.reader()?;
            let mut writer = files.output("target")?.writer()?;
            std::io::copy(&mut reader, &mut writer)?;
            writer.flush()?;
            Ok(())
        })
        .build()
}

/// Write `source` upper-cased to `target`
pub fn uppercase() -> Result<UnitRef> {
    Transform::builder("uppercase")
        .input("source")
        .output("target")
        .script(|files| {
            let text = files.input("source")?.read_to_string()?;
            files.output("target")?.write_str(&text.to_uppercase())?;
            Ok(())
        })
        .build()
}

/// Write the number of lines in `source` to `count`
pub fn line_count() -> Result<UnitRef> {
    Transform::builder("line_count")
        .input("source")
        .output("count")
        .script(|files| {
            let reader = BufReader::new(files.input("source")?.reader()?);
            let mut lines = 0usize;
            for line in reader.lines() {
                line?;
                lines += 1;
            }
            files.output("count")?.write_str(&format!("{}\n", lines))?;
            Ok(())
        })
        .build()
}

/// Concatenate every file in `parts`, in order, into `joined`
pub fn concat() -> Result<UnitRef> {
    Transform::builder("concat")
        .input_set("parts")
        .output("joined")
        .script(|files| {
            let mut writer = files.output("joined")?.writer()?;
            for part in files.input_set("parts")? {
                let mut reader = part.reader()?;
                std::io::copy(&mut reader, &mut writer)?;
            }
            writer.flush()?;
            Ok(())
        })
        .build()
}

/// Write the SHA-256 of `source` as lowercase hex to `digest`
pub fn checksum() -> Result<UnitRef> {
    Transform::builder("checksum")
        .input("source")
        .output("digest")
        .script(|files| {
            let mut reader = files.input("source")?.reader()?;
            let mut hasher = Sha256::new();
            let mut buffer = [0u8; 8192];
            loop {
                let read = reader.read(&mut buffer)?;
                if read == 0 {
                    break;
                }
                hasher.update(&buffer[..read]);
            }
            let hex: String = hasher
                .finalize()
                .iter()
                .map(|byte| format!("{:02x}", byte))
                .collect();
            files.output("digest")?.write_str(&format!("{}\n", hex))?;
            Ok(())
        })
        .build()
}

/// `copy` then `uppercase`, with the copy kept as an internal intermediate
pub fn shout(copy: UnitRef, uppercase: UnitRef) -> Result<UnitRef> {
    let staged = |tag: &str| BTreeMap::from([(tag.to_string(), "copied".to_string())]);
    let copy = Rename::new(copy, BTreeMap::new(), staged("target"))?.into_unit();
    let uppercase = Rename::new(uppercase, staged("source"), BTreeMap::new())?.into_unit();
    Ok(Sequence::new(vec![copy, uppercase], std::iter::empty::<String>())?
        .with_name("shout")
        .into_unit())
}

/// `checksum` and `line_count` side by side over one `source`
pub fn fingerprint(checksum: UnitRef, line_count: UnitRef) -> Result<UnitRef> {
    Ok(Merge::new(vec![checksum, line_count])?
        .with_name("fingerprint")
        .into_unit())
}

/// Registry holding every built-in leaf and pipeline
pub fn registry() -> Result<Registry> {
    let mut registry = Registry::new();
    let copy = copy()?;
    let uppercase = uppercase()?;
    let line_count = line_count()?;
    let checksum = checksum()?;

    registry.register(shout(copy.clone(), uppercase.clone())?)?;
    registry.register(fingerprint(checksum.clone(), line_count.clone())?)?;
    registry.register(copy)?;
    registry.register(uppercase)?;
    registry.register(line_count)?;
    registry.register(checksum)?;
    registry.register(concat()?)?;
    Ok(registry)
}
