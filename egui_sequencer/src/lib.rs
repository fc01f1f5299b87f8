//! # egui_sequencer
//!
//! 可嵌入的钢琴卷帘音符序列器组件。
//!
//! ## 功能特性
//!
//! - **音符网格**：双击创建/删除音符，拖拽移动、调整左右边界，按网格量化
//! - **选择**：两阶段点选、Shift 多选、套索框选，网格与力度轨道共享选择集
//! - **标尺**：时间标尺拖拽缩放，音高标尺拖拽平移/缩放并可试听琴键
//! - **力度轨道**：拖拽力度手柄，可拖动的分隔条调整轨道高度
//! - **持久化**：JSON 快照、项目文件与标准 MIDI 文件导入导出
//! - **主题**：`default` 与 `live` 两套外观
//!
//! ## 基本使用
//!
//! ```ignore
//! use egui_sequencer::{Sequencer, SequencerOptions};
//!
//! let mut sequencer = Sequencer::new(SequencerOptions::default())?;
//!
//! // 在 egui UI 中使用
//! sequencer.ui(ui);
//! ```
//!
//! ## 集成到宿主应用
//!
//! ```ignore
//! use egui_sequencer::{Sequencer, SequencerCommand, SequencerEvent};
//!
//! sequencer.set_event_listener(|event| {
//!     if let SequencerEvent::NoteAdded(note) = event {
//!         log::info!("added {note:?}");
//!     }
//! });
//!
//! sequencer.set_attribute("duration", "64")?;
//! sequencer.apply_command(SequencerCommand::SetTheme("live".into()))?;
//! ```

pub mod component;
pub mod editor;
pub mod error;
pub mod grid;
pub mod lasso;
pub mod project;
pub mod selection;
pub mod structure;
pub mod theme;
pub mod ui;
pub mod view;

pub use component::gesture::PointerInput;
pub use component::Modifiers;
pub use editor::{SequencerCommand, SequencerEvent, SequencerOptions};
pub use error::{SequencerError, SequencerResult};
pub use grid::{DragAction, NoteGrid};
pub use project::ProjectFile;
pub use structure::{Note, NoteId, NoteRecord, Range, SequencerSnapshot, TimeSignature};
pub use theme::Colors;
pub use ui::{Part, Sequencer};
pub use view::DisplayModel;
