// FILE: crates/library/src/media.rs

//! Audio tag reading for attached media
//!
//! MP3 credits live in ID3v2 `PRIV` frames owned by `wolnelektury.pl?<key>`;
//! Ogg files carry them as plain Vorbis comments.

use folio_core::{MediaExtraInfo, MediaType};
use lofty::config::ParseOptions;
use lofty::id3::v2::{Frame, Id3v2Tag};
use lofty::mpeg::MpegFile;
use lofty::ogg::{VorbisComments, VorbisFile};
use lofty::prelude::*;
use lofty::tag::Tag;
use log::debug;
use std::fs::File;
use std::path::Path;

const PRIVATE_OWNER: &str = "wolnelektury.pl";
const PROJECT_KEY: &str = "project";
const FUNDED_BY_KEY: &str = "funded_by";
const SOURCE_SHA1_KEY: &str = "flac_sha1";

/// Reads credits from the audio tags of a media file
///
/// Unreadable files and formats without tags yield empty credits.
pub fn read_media_info(path: &Path, media_type: MediaType) -> MediaExtraInfo {
    let info = match media_type {
        MediaType::Mp3 => read_id3v2(path).map(|tag| id3v2_credits(&tag)),
        MediaType::Ogg => read_vorbis(path).map(|comments| vorbis_credits(&comments)),
        MediaType::Daisy => None,
    };
    info.unwrap_or_default()
}

/// Reads the SHA1 of the master recording stored in the tags
pub fn read_source_sha1(path: &Path, media_type: MediaType) -> Option<String> {
    let sha1 = match media_type {
        MediaType::Mp3 => private_data(&read_id3v2(path)?, SOURCE_SHA1_KEY),
        MediaType::Ogg => read_vorbis(path)?
            .get(SOURCE_SHA1_KEY)
            .map(str::to_string)
            .unwrap_or_default(),
        MediaType::Daisy => return None,
    };
    Some(sha1).filter(|s| !s.is_empty())
}

pub(crate) fn id3v2_credits(tag: &Id3v2Tag) -> MediaExtraInfo {
    let generic = Tag::from(tag.clone());
    MediaExtraInfo {
        artist_name: joined(generic.get_strings(&ItemKey::TrackArtist)),
        director_name: joined(generic.get_strings(&ItemKey::Conductor)),
        project: private_data(tag, PROJECT_KEY),
        funded_by: private_data(tag, FUNDED_BY_KEY),
    }
}

pub(crate) fn vorbis_credits(comments: &VorbisComments) -> MediaExtraInfo {
    MediaExtraInfo {
        artist_name: joined(comments.get_all("artist")),
        director_name: joined(comments.get_all("conductor")),
        project: joined(comments.get_all(PROJECT_KEY)),
        funded_by: joined(comments.get_all(FUNDED_BY_KEY)),
    }
}

/// Joins the data of every `PRIV` frame owned by `wolnelektury.pl?<key>`
fn private_data(tag: &Id3v2Tag, key: &str) -> String {
    let owner = format!("{}?{}", PRIVATE_OWNER, key);
    joined(tag.into_iter().filter_map(|frame| match frame {
        Frame::Private(private) if private.owner == owner => {
            Some(String::from_utf8_lossy(&private.private_data).into_owned())
        }
        _ => None,
    }))
}

fn read_id3v2(path: &Path) -> Option<Id3v2Tag> {
    let mut file = open(path)?;
    match MpegFile::read_from(&mut file, ParseOptions::new().read_properties(false)) {
        Ok(mpeg) => mpeg.id3v2().cloned(),
        Err(e) => {
            debug!("No readable ID3 tags in {}: {}", path.display(), e);
            None
        }
    }
}

fn read_vorbis(path: &Path) -> Option<VorbisComments> {
    let mut file = open(path)?;
    match VorbisFile::read_from(&mut file, ParseOptions::new().read_properties(false)) {
        Ok(vorbis) => Some(vorbis.vorbis_comments().clone()),
        Err(e) => {
            debug!("No readable Vorbis comments in {}: {}", path.display(), e);
            None
        }
    }
}

fn open(path: &Path) -> Option<File> {
    File::open(path)
        .map_err(|e| debug!("Cannot open {}: {}", path.display(), e))
        .ok()
}

fn joined<S: AsRef<str>>(values: impl Iterator<Item = S>) -> String {
    values
        .map(|value| value.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lofty::config::WriteOptions;
    use lofty::id3::v2::PrivateFrame;
    use tempfile::NamedTempFile;

    fn private(key: &str, data: &str) -> Frame<'static> {
        Frame::Private(PrivateFrame::new(
            format!("wolnelektury.pl?{}", key),
            data.as_bytes().to_vec(),
        ))
    }

    fn credited_id3v2() -> Id3v2Tag {
        let mut tag = Id3v2Tag::new();
        tag.set_artist("Jan Peszek".to_string());
        tag.insert(private("project", "Czytamy słuchając"));
        tag.insert(private("funded_by", "Fundacja Nowoczesna Polska"));
        tag.insert(private("flac_sha1", "0123456789abcdef0123456789abcdef01234567"));
        tag.insert(Frame::Private(PrivateFrame::new(
            "example.com?project".to_string(),
            b"Inny".to_vec(),
        )));
        tag
    }

    #[test]
    fn test_untagged_format() {
        let info = read_media_info(Path::new("/nonexistent.daisy.zip"), MediaType::Daisy);
        assert_eq!(info, MediaExtraInfo::default());
        assert!(read_source_sha1(Path::new("/nonexistent.daisy.zip"), MediaType::Daisy).is_none());
    }

    #[test]
    fn test_unreadable_file_gives_empty_credits() {
        let file = NamedTempFile::with_suffix(".mp3").unwrap();
        std::fs::write(file.path(), b"not audio").unwrap();

        let info = read_media_info(file.path(), MediaType::Mp3);
        assert!(info.artist_name.is_empty());
        assert!(read_source_sha1(file.path(), MediaType::Ogg).is_none());
    }

    #[test]
    fn test_id3v2_private_frames() {
        let info = id3v2_credits(&credited_id3v2());
        assert_eq!(info.artist_name, "Jan Peszek");
        assert_eq!(info.project, "Czytamy słuchając");
        assert_eq!(info.funded_by, "Fundacja Nowoczesna Polska");
        assert!(info.director_name.is_empty());
    }

    #[test]
    fn test_mp3_credits_read_from_file() {
        let file = NamedTempFile::with_suffix(".mp3").unwrap();
        let mut bytes = Vec::new();
        credited_id3v2()
            .dump_to(&mut bytes, WriteOptions::default())
            .unwrap();
        std::fs::write(file.path(), &bytes).unwrap();

        let info = read_media_info(file.path(), MediaType::Mp3);
        assert_eq!(info.artist_name, "Jan Peszek");
        assert_eq!(info.project, "Czytamy słuchając");
        assert_eq!(
            read_source_sha1(file.path(), MediaType::Mp3).as_deref(),
            Some("0123456789abcdef0123456789abcdef01234567")
        );
    }

    #[test]
    fn test_vorbis_credits() {
        let mut comments = VorbisComments::default();
        comments.push("ARTIST".to_string(), "Anna Seniuk".to_string());
        comments.push("ARTIST".to_string(), "Jan Englert".to_string());
        comments.push("CONDUCTOR".to_string(), "Jacek Różański".to_string());
        comments.push("PROJECT".to_string(), "Czytamy słuchając".to_string());
        comments.push("FUNDED_BY".to_string(), "MKiDN".to_string());

        let info = vorbis_credits(&comments);
        assert_eq!(info.artist_name, "Anna Seniuk, Jan Englert");
        assert_eq!(info.director_name, "Jacek Różański");
        assert_eq!(info.project, "Czytamy słuchając");
        assert_eq!(info.funded_by, "MKiDN");
    }
}
