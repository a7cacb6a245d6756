//! Board-set splitting and library packaging
//!
//! Lesson PBN files hold a whole topic; for table play they are split
//! into small fixed-size sets. Packaging then lays the results out as a
//! distributable folder tree: one folder per lesson title with `All` and
//! per-set-size subfolders.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// One board set cut from a PBN file.
#[derive(Debug, Clone)]
pub struct BoardSet {
    pub file_name: String,
    pub content: String,
}

/// Split PBN content into sets of `set_size` boards. The preamble (all
/// text before the first `[Board`) repeats at the top of every set. Set
/// file names follow the legacy pattern
/// `{base} Set {k} Hands {a}-{b}.pbn`, with a `(n boards)` suffix when
/// the final set runs short.
pub fn split_into_board_sets(base_name: &str, content: &str, set_size: usize) -> Vec<BoardSet> {
    let Some(first_board) = content.find("[Board") else {
        return Vec::new();
    };
    let preamble = content[..first_board].trim_end();
    let boards: Vec<&str> = split_boards(&content[first_board..]);

    let mut sets = Vec::new();
    for (set_index, chunk) in boards.chunks(set_size).enumerate() {
        let start = set_index * set_size + 1;
        let finish = set_index * set_size + chunk.len();
        let extra = if chunk.len() < set_size {
            let plural = if chunk.len() == 1 { "" } else { "s" };
            format!(" ({} board{})", chunk.len(), plural)
        } else {
            String::new()
        };
        let file_name = format!(
            "{} Set {} Hands {}-{}{}.pbn",
            base_name,
            set_index + 1,
            start,
            finish,
            extra
        );
        let content = format!("{}\n\n{}", preamble, chunk.join("\n\n"));
        sets.push(BoardSet { file_name, content });
    }
    sets
}

/// Split body text into per-board blocks, each starting at `[Board`.
fn split_boards(body: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = Vec::new();
    let mut from = 0;
    while let Some(pos) = body[from..].find("[Board") {
        starts.push(from + pos);
        from += pos + 6;
    }
    let mut blocks = Vec::new();
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(body.len());
        let block = body[start..end].trim();
        if !block.is_empty() {
            blocks.push(block);
        }
    }
    blocks
}

/// For every lesson folder under `root` with an `All` subfolder, split
/// its first PBN file into sets under `{n}-Board Sets/Source`. Returns
/// the files written.
pub fn create_board_subsets(root: &Path, set_size: usize) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let mut lesson_dirs: Vec<PathBuf> = std::fs::read_dir(root)
        .with_context(|| format!("Failed to read {}", root.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    lesson_dirs.sort();

    for dir in lesson_dirs {
        let all_dir = dir.join("All");
        if !all_dir.is_dir() {
            continue;
        }
        let mut pbn_files: Vec<PathBuf> = std::fs::read_dir(&all_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("pbn"))
                    .unwrap_or(false)
            })
            .collect();
        pbn_files.sort();
        let Some(pbn_path) = pbn_files.first() else {
            log::warn!("No .pbn file found in {}", all_dir.display());
            continue;
        };

        let base_name = pbn_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = std::fs::read_to_string(pbn_path)?;
        let sets = split_into_board_sets(&base_name, &content, set_size);
        if sets.is_empty() {
            log::warn!("No board sections found in {}", pbn_path.display());
            continue;
        }

        let out_dir = dir.join(format!("{}-Board Sets", set_size)).join("Source");
        std::fs::create_dir_all(&out_dir)?;
        for set in sets {
            let out_path = out_dir.join(&set.file_name);
            std::fs::write(&out_path, set.content + "\n")?;
            log::info!("Created {}", out_path.display());
            written.push(out_path);
        }
    }
    Ok(written)
}

/// A row of the titles CSV that names each distributable lesson.
#[derive(Debug, Clone, Deserialize)]
pub struct TitleRow {
    #[serde(rename = "Subfolder")]
    pub subfolder: String,
    #[serde(rename = "Title")]
    pub title: String,
}

/// Load the titles CSV, keeping only rows with a title, sorted by title.
pub fn load_titles(path: &Path) -> Result<Vec<TitleRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open titles CSV {}", path.display()))?;
    let mut rows: Vec<TitleRow> = Vec::new();
    for row in reader.deserialize() {
        let row: TitleRow = row.context("Failed to read titles row")?;
        if !row.title.trim().is_empty() {
            rows.push(row);
        }
    }
    rows.sort_by(|a, b| a.title.trim().cmp(b.title.trim()));
    Ok(rows)
}

/// Build the lesson hierarchy: one folder per title holding `All`,
/// `4-Board Sets`, and `5-Board Sets`, with the lesson's PBN copied into
/// `All` from `source_dir` when present.
pub fn build_lesson_hierarchy(
    titles: &[TitleRow],
    source_dir: &Path,
    dest_root: &Path,
) -> Result<()> {
    for row in titles {
        let title_dir = dest_root.join(row.title.trim());
        let all_dir = title_dir.join("All");
        std::fs::create_dir_all(&all_dir)?;
        std::fs::create_dir_all(title_dir.join("4-Board Sets"))?;
        std::fs::create_dir_all(title_dir.join("5-Board Sets"))?;

        let pbn_name = format!("{}.pbn", row.subfolder.trim());
        let src = source_dir.join(&pbn_name);
        if src.exists() {
            std::fs::copy(&src, all_dir.join(&pbn_name))
                .with_context(|| format!("Failed to copy {}", src.display()))?;
        } else {
            log::warn!("{} does not exist", src.display());
        }
    }
    Ok(())
}

/// Flatten every `.pbn` under `pbn_root` into `package_dir`.
pub fn collect_package(pbn_root: &Path, package_dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(package_dir)?;
    let mut count = 0;
    collect_pbns_into(pbn_root, package_dir, &mut count)?;
    log::info!("Copied {} files into {}", count, package_dir.display());
    Ok(count)
}

fn collect_pbns_into(dir: &Path, package_dir: &Path, count: &mut usize) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_pbns_into(&path, package_dir, count)?;
        } else if path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pbn"))
            .unwrap_or(false)
        {
            if let Some(name) = path.file_name() {
                std::fs::copy(&path, package_dir.join(name))?;
                *count += 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pbn_with_boards(n: usize) -> String {
        let mut content = String::from("%Creator: test\n%HRTitleEvent Stayman\n");
        for i in 1..=n {
            content.push_str(&format!(
                "[Board \"{}\"]\n[Dealer \"N\"]\n[Contract \"3NT\"]\n\n",
                i
            ));
        }
        content
    }

    #[test]
    fn test_split_even_sets() {
        let sets = split_into_board_sets("Stayman", &pbn_with_boards(8), 4);
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].file_name, "Stayman Set 1 Hands 1-4.pbn");
        assert_eq!(sets[1].file_name, "Stayman Set 2 Hands 5-8.pbn");
        // Preamble repeats in every set.
        assert!(sets[1].content.starts_with("%Creator: test"));
        assert_eq!(sets[0].content.matches("[Board").count(), 4);
    }

    #[test]
    fn test_short_final_set_is_labelled() {
        let sets = split_into_board_sets("Stayman", &pbn_with_boards(9), 4);
        assert_eq!(sets.len(), 3);
        assert_eq!(
            sets[2].file_name,
            "Stayman Set 3 Hands 9-9 (1 board).pbn"
        );

        let sets = split_into_board_sets("Stayman", &pbn_with_boards(10), 4);
        assert_eq!(
            sets[2].file_name,
            "Stayman Set 3 Hands 9-10 (2 boards).pbn"
        );
    }

    #[test]
    fn test_no_boards_yields_no_sets() {
        assert!(split_into_board_sets("X", "%Creator: test\n", 4).is_empty());
    }

    #[test]
    fn test_hierarchy_and_package() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("Stayman.pbn"), pbn_with_boards(4)).unwrap();

        let titles = vec![TitleRow {
            subfolder: "Stayman".to_string(),
            title: "201 - Stayman".to_string(),
        }];
        let dest = dir.path().join("library");
        build_lesson_hierarchy(&titles, &source, &dest).unwrap();

        let all = dest.join("201 - Stayman").join("All");
        assert!(all.join("Stayman.pbn").exists());
        assert!(dest.join("201 - Stayman").join("4-Board Sets").is_dir());

        let written = create_board_subsets(&dest, 4).unwrap();
        assert_eq!(written.len(), 1);
        assert!(written[0]
            .to_string_lossy()
            .contains("4-Board Sets/Source/Stayman Set 1 Hands 1-4.pbn"));

        let package = dir.path().join("package");
        let count = collect_package(&dest, &package).unwrap();
        assert_eq!(count, 2);
        assert!(package.join("Stayman.pbn").exists());
    }
}
