use crate::grid::{DEFAULT_ADAPTIVE_INDEX, DEFAULT_FIXED_INDEX};
use crate::structure::{Note, NoteId, NoteRecord, Range, SequencerSnapshot, TimeSignature, MAX_VELOCITY};
use crate::theme::Colors;

/// 外部宿主可监听的编辑事件
#[derive(Clone, Debug, PartialEq)]
pub enum SequencerEvent {
    NoteAdded(Note),
    NoteDeleted(Note),
    NoteUpdated {
        before: Note,
        after: Note,
    },
    SelectionChanged(Vec<NoteId>),
    /// 整体替换了音符列表（命令或快照载入）
    NotesReplaced {
        count: usize,
    },
    /// 可见时间区间、片段区间或音高区间发生变化
    RangesChanged {
        max_time_range: Range,
        visible_time_range: Range,
        vertical_range: Range,
    },
    /// 在音高标尺的琴键上按下/松开；`None` 表示停止试听
    PreviewPitch(Option<u8>),
    ThemeChanged(&'static str),
}

/// 宿主可推送到编辑器的命令
#[derive(Clone, Debug)]
pub enum SequencerCommand {
    ReplaceSnapshot(SequencerSnapshot),
    SetNotes(Vec<NoteRecord>),
    ClearNotes,
    DeleteSelection,
    SelectAll,
    SetTimeStart(f64),
    SetDuration(f64),
    SetTheme(String),
    SetSignature(TimeSignature),
    /// `true` 为自适应量化，`false` 为固定量化
    SetAdaptiveMode(bool),
    SetAdaptiveIndex(usize),
    SetFixedIndex(usize),
    SetVisibleTimeRange(Range),
    SetVerticalRange(Range),
    SetColors(Colors),
    SetDefaultVelocity(u8),
}

/// 初始化与运行时的视图配置
#[derive(Clone, Debug)]
pub struct SequencerOptions {
    /// 片段起点（十六分音符）
    pub time_start: f64,
    /// 片段长度（十六分音符）
    pub duration: f64,
    /// 初始可见时间区间；`None` 表示显示前 16 个十六分音符
    pub visible_time_range: Option<Range>,
    pub vertical_range: Range,
    pub signature: TimeSignature,
    pub theme: String,
    /// 覆盖主题默认颜色
    pub colors: Option<Colors>,
    /// 音高缩放一步 = 当前区间 / 该值
    pub zoom_sensitivity: f64,
    /// 力度轨道高度（像素）；负值表示占总高度的比例
    pub velocity_track_height: f32,
    pub adaptive_mode: bool,
    pub adaptive_index: usize,
    pub fixed_index: usize,
    /// 新建音符的力度
    pub default_velocity: u8,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self {
            time_start: 0.0,
            duration: 32.0,
            visible_time_range: None,
            vertical_range: Range::new(58.0, 82.0),
            signature: TimeSignature::default(),
            theme: "default".to_string(),
            colors: None,
            zoom_sensitivity: 30.0,
            velocity_track_height: 80.0,
            adaptive_mode: true,
            adaptive_index: DEFAULT_ADAPTIVE_INDEX,
            fixed_index: DEFAULT_FIXED_INDEX,
            default_velocity: MAX_VELOCITY,
        }
    }
}

impl SequencerOptions {
    pub fn with_theme(theme: &str) -> Self {
        Self {
            theme: theme.to_string(),
            ..Self::default()
        }
    }

    /// 可见区间，缺省时取片段开头的 16 个十六分音符
    pub fn initial_visible_range(&self) -> Range {
        self.visible_time_range
            .unwrap_or_else(|| Range::new(self.time_start, self.time_start + 16.0))
    }
}
