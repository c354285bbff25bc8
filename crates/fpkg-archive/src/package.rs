use crate::checksum::{bytes_sha256, hex_digest};
use crate::walk::rooted_to_host;
use crate::ArchiveError;
use fpkg_schema::{Config, Manifest, Perm, MANIFEST_ENTRY_NAME};
use std::fs;
use std::io::Write;
use std::path::Path;
use tar::{EntryType, Header};
use tracing::debug;

/// Size of the ustar `name` field; longer names get a GNU long-name record.
const NAME_FIELD_LEN: usize = 100;
const GNU_LONG_LINK: &[u8] = b"././@LongLink";
const MANIFEST_MODE: u32 = 0o644;

/// Everything needed to serialize one package.
pub struct PackageInput<'a> {
    pub config: &'a Config,
    /// Source directory the manifest was generated from.
    pub root: &'a Path,
    pub manifest: &'a Manifest,
    /// Modification time stamped on every entry, in seconds since the epoch.
    pub mtime: u64,
}

struct Ownership<'a> {
    uname: &'a str,
    gname: &'a str,
}

/// Write a package archive to `out` and return the writer once the archive
/// is finalized.
///
/// Entry order is fixed: `+MANIFEST`, then files sorted by path, then
/// directories sorted by path. File content is read from `root` at this
/// point and must still match the checksum recorded in the manifest.
///
/// Determinism guarantees:
/// - Entry order depends only on manifest keys
/// - A single timestamp is used for every entry
/// - uid/gid are 0; ownership is carried by user and group names
pub fn write_package<W: Write>(out: W, input: &PackageInput<'_>) -> Result<W, ArchiveError> {
    let PackageInput {
        config,
        root,
        manifest,
        mtime,
    } = *input;
    let mut ar = tar::Builder::new(out);

    let data = manifest.to_compact_json()?;
    let owner = Ownership {
        uname: config.file_owner(),
        gname: config.file_group(),
    };
    append_entry(
        &mut ar,
        MANIFEST_ENTRY_NAME,
        EntryType::Regular,
        MANIFEST_MODE,
        &owner,
        mtime,
        &data,
    )?;

    for (path, file) in &manifest.files {
        let mode = parse_perm(path, &file.perm)?;
        let full_path = rooted_to_host(root, path);
        let data = fs::read(&full_path).map_err(|e| ArchiveError::Read {
            path: full_path.clone(),
            source: e,
        })?;
        if hex_digest(&bytes_sha256(&data)) != file.sum {
            return Err(ArchiveError::ContentChanged(full_path));
        }
        let owner = Ownership {
            uname: config.explicit_file_owner().unwrap_or(&file.uname),
            gname: config.explicit_file_group().unwrap_or(&file.gname),
        };
        debug!("adding file {path} ({} bytes, mode {})", data.len(), file.perm);
        append_entry(&mut ar, path, EntryType::Regular, mode, &owner, mtime, &data)?;
    }

    for (path, dir) in &manifest.directories {
        let mode = parse_perm(path, &dir.perm)?;
        let owner = Ownership {
            uname: config.explicit_file_owner().unwrap_or(&dir.uname),
            gname: config.explicit_file_group().unwrap_or(&dir.gname),
        };
        debug!("adding directory {path} (mode {})", dir.perm);
        append_entry(&mut ar, path, EntryType::Directory, mode, &owner, mtime, &[])?;
    }

    ar.into_inner().map_err(ArchiveError::Finish)
}

fn parse_perm(entry: &str, perm: &Perm) -> Result<u32, ArchiveError> {
    perm.to_mode().ok_or_else(|| ArchiveError::InvalidPermission {
        entry: entry.to_owned(),
        perm: perm.to_string(),
    })
}

fn append_entry<W: Write>(
    ar: &mut tar::Builder<W>,
    name: &str,
    entry_type: EntryType,
    mode: u32,
    owner: &Ownership<'_>,
    mtime: u64,
    data: &[u8],
) -> Result<(), ArchiveError> {
    let wrap = |source| ArchiveError::Write {
        entry: name.to_owned(),
        source,
    };

    let mut header = Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_size(data.len() as u64);
    header.set_mode(mode);
    header.set_mtime(mtime);
    header.set_uid(0);
    header.set_gid(0);
    header.set_username(owner.uname).map_err(wrap)?;
    header.set_groupname(owner.gname).map_err(wrap)?;
    set_entry_name(ar, &mut header, name, mtime).map_err(wrap)?;
    header.set_cksum();
    ar.append(&header, data).map_err(wrap)
}

/// Store `name` verbatim in the header.
///
/// `Header::set_path` rejects absolute paths, but `pkg(8)` expects entries
/// named exactly like the rooted manifest keys, so the name field is filled
/// directly. Names that do not fit are preceded by a GNU long-name record.
fn set_entry_name<W: Write>(
    ar: &mut tar::Builder<W>,
    header: &mut Header,
    name: &str,
    mtime: u64,
) -> std::io::Result<()> {
    let bytes = name.as_bytes();
    if bytes.len() > NAME_FIELD_LEN {
        let mut long = Header::new_gnu();
        long.as_old_mut().name[..GNU_LONG_LINK.len()].copy_from_slice(GNU_LONG_LINK);
        long.set_entry_type(EntryType::GNULongName);
        long.set_mode(0o644);
        long.set_uid(0);
        long.set_gid(0);
        long.set_mtime(mtime);
        long.set_size(bytes.len() as u64 + 1);
        long.set_cksum();
        let mut payload = bytes.to_vec();
        payload.push(0);
        ar.append(&long, payload.as_slice())?;
    }

    let field = &mut header.as_old_mut().name;
    let len = bytes.len().min(NAME_FIELD_LEN);
    field.fill(0);
    field[..len].copy_from_slice(&bytes[..len]);
    Ok(())
}
