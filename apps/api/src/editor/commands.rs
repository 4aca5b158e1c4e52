// Toolbar commands over the document block list.

use serde::Deserialize;
use thiserror::Error;

use crate::layout::Block;

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("Block index {index} out of range (document has {len} blocks)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Heading level must be between 1 and 6, got {0}")]
    InvalidHeadingLevel(u8),

    #[error("Table needs at least one row and one column, got {rows}x{cols}")]
    EmptyTable { rows: usize, cols: usize },

    #[error("Block {0} has no editable text")]
    NotText(usize),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Command {
    SetHeading { index: usize, level: u8 },
    SetParagraph { index: usize },
    /// Turns a text block into a list (one item per line), switches list kind,
    /// or unwraps a list of the same kind back into paragraphs.
    ToggleList { index: usize, ordered: bool },
    /// Inserts before `index`; `index == len` appends.
    InsertTable { index: usize, rows: usize, cols: usize },
    InsertImage { index: usize, src: String, alt: String },
    InsertPageBreak { index: usize },
    DeleteBlock { index: usize },
}

pub fn apply_command(blocks: &mut Vec<Block>, command: Command) -> Result<(), CommandError> {
    match command {
        Command::SetHeading { index, level } => {
            if !(1..=6).contains(&level) {
                return Err(CommandError::InvalidHeadingLevel(level));
            }
            let text = single_line(&editable_text(blocks, index)?);
            blocks[index] = Block::heading(level, text);
        }
        Command::SetParagraph { index } => {
            let text = editable_text(blocks, index)?;
            blocks[index] = Block::paragraph(text);
        }
        Command::ToggleList { index, ordered } => toggle_list(blocks, index, ordered)?,
        Command::InsertTable { index, rows, cols } => {
            if rows == 0 || cols == 0 {
                return Err(CommandError::EmptyTable { rows, cols });
            }
            insert(
                blocks,
                index,
                Block::Table {
                    rows: vec![vec![String::new(); cols]; rows],
                },
            )?;
        }
        Command::InsertImage { index, src, alt } => insert(
            blocks,
            index,
            Block::Image {
                src,
                alt,
                height_px: None,
            },
        )?,
        Command::InsertPageBreak { index } => insert(blocks, index, Block::PageBreak)?,
        Command::DeleteBlock { index } => {
            check_index(blocks, index)?;
            blocks.remove(index);
        }
    }
    Ok(())
}

fn check_index(blocks: &[Block], index: usize) -> Result<(), CommandError> {
    if index < blocks.len() {
        Ok(())
    } else {
        Err(CommandError::IndexOutOfRange {
            index,
            len: blocks.len(),
        })
    }
}

fn insert(blocks: &mut Vec<Block>, index: usize, block: Block) -> Result<(), CommandError> {
    if index > blocks.len() {
        return Err(CommandError::IndexOutOfRange {
            index,
            len: blocks.len(),
        });
    }
    blocks.insert(index, block);
    Ok(())
}

/// Text of a block that can change type. List items are newline-joined
/// without their markers.
fn editable_text(blocks: &[Block], index: usize) -> Result<String, CommandError> {
    check_index(blocks, index)?;
    match &blocks[index] {
        Block::Heading { text, .. }
        | Block::Paragraph { text }
        | Block::Quote { text }
        | Block::Code { text } => Ok(text.clone()),
        Block::List { items, .. } => Ok(items.join("\n")),
        Block::Table { .. } | Block::Image { .. } | Block::PageBreak => {
            Err(CommandError::NotText(index))
        }
    }
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn toggle_list(blocks: &mut Vec<Block>, index: usize, ordered: bool) -> Result<(), CommandError> {
    check_index(blocks, index)?;
    if let Block::List {
        ordered: current,
        items,
    } = &blocks[index]
    {
        if *current == ordered {
            let paragraphs: Vec<Block> = items.iter().map(Block::paragraph).collect();
            blocks.splice(index..=index, paragraphs);
        } else {
            blocks[index] = Block::List {
                ordered,
                items: items.clone(),
            };
        }
        return Ok(());
    }

    let text = editable_text(blocks, index)?;
    let items: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    let items = if items.is_empty() { vec![String::new()] } else { items };
    blocks[index] = Block::List { ordered, items };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Vec<Block> {
        vec![
            Block::paragraph("Pendahuluan"),
            Block::Code {
                text: "baris satu\nbaris dua".into(),
            },
        ]
    }

    #[test]
    fn test_set_heading_and_back() {
        let mut blocks = doc();
        apply_command(&mut blocks, Command::SetHeading { index: 0, level: 2 }).unwrap();
        assert_eq!(blocks[0], Block::heading(2, "Pendahuluan"));
        apply_command(&mut blocks, Command::SetParagraph { index: 0 }).unwrap();
        assert_eq!(blocks[0], Block::paragraph("Pendahuluan"));
    }

    #[test]
    fn test_invalid_heading_level() {
        let mut blocks = doc();
        assert_eq!(
            apply_command(&mut blocks, Command::SetHeading { index: 0, level: 7 }),
            Err(CommandError::InvalidHeadingLevel(7))
        );
    }

    #[test]
    fn test_toggle_list_cycle() {
        let mut blocks = doc();
        apply_command(&mut blocks, Command::ToggleList { index: 1, ordered: false }).unwrap();
        assert_eq!(
            blocks[1],
            Block::List {
                ordered: false,
                items: vec!["baris satu".into(), "baris dua".into()],
            }
        );
        apply_command(&mut blocks, Command::ToggleList { index: 1, ordered: true }).unwrap();
        assert!(matches!(blocks[1], Block::List { ordered: true, .. }));
        apply_command(&mut blocks, Command::ToggleList { index: 1, ordered: true }).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2], Block::paragraph("baris dua"));
    }

    #[test]
    fn test_insert_table_image_and_break() {
        let mut blocks = doc();
        apply_command(&mut blocks, Command::InsertTable { index: 2, rows: 2, cols: 3 }).unwrap();
        apply_command(&mut blocks, Command::InsertPageBreak { index: 1 }).unwrap();
        apply_command(
            &mut blocks,
            Command::InsertImage {
                index: 0,
                src: "grafik.png".into(),
                alt: "Grafik".into(),
            },
        )
        .unwrap();
        assert_eq!(blocks.len(), 5);
        assert!(matches!(blocks[0], Block::Image { .. }));
        assert!(blocks[2].is_page_break());
        match &blocks[4] {
            Block::Table { rows } => {
                assert_eq!(rows.len(), 2);
                assert!(rows.iter().all(|r| r.len() == 3));
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_and_non_text_errors() {
        let mut blocks = doc();
        assert_eq!(
            apply_command(&mut blocks, Command::DeleteBlock { index: 5 }),
            Err(CommandError::IndexOutOfRange { index: 5, len: 2 })
        );
        assert_eq!(
            apply_command(&mut blocks, Command::InsertTable { index: 0, rows: 0, cols: 2 }),
            Err(CommandError::EmptyTable { rows: 0, cols: 2 })
        );
        apply_command(&mut blocks, Command::InsertPageBreak { index: 0 }).unwrap();
        assert_eq!(
            apply_command(&mut blocks, Command::SetParagraph { index: 0 }),
            Err(CommandError::NotText(0))
        );
        apply_command(&mut blocks, Command::DeleteBlock { index: 0 }).unwrap();
        assert_eq!(blocks, doc());
    }

    #[test]
    fn test_command_deserializes_from_toolbar_json() {
        let cmd: Command =
            serde_json::from_str(r#"{"command":"insertTable","index":0,"rows":2,"cols":2}"#).unwrap();
        assert_eq!(cmd, Command::InsertTable { index: 0, rows: 2, cols: 2 });
    }

    #[test]
    fn test_set_paragraph_on_long_list_paginates_back_to_same_text() {
        use crate::layout::{paginate, MetricMeasurer, PageGeometry};

        let items: Vec<String> = (0..400)
            .map(|i| format!("butir nomor {i} dari daftar pustaka yang cukup panjang"))
            .collect();
        let mut blocks = vec![Block::List {
            ordered: false,
            items,
        }];
        apply_command(&mut blocks, Command::SetParagraph { index: 0 }).unwrap();
        let text = blocks[0].text();
        assert!(!text.contains('\n'));

        let p = paginate(&blocks, &PageGeometry::default(), &MetricMeasurer::default());
        assert!(p.page_count() > 1);
        let rebuilt: Vec<String> = p
            .pages
            .iter()
            .flat_map(|page| page.blocks.iter())
            .map(|b| b.block.text())
            .collect();
        assert_eq!(rebuilt.join(" "), text);
    }
}
