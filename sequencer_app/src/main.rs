use eframe::egui::{self, TopBottomPanel};
use egui_sequencer::grid::{ADAPTIVE_LABELS, FIXED_LABELS};
use egui_sequencer::theme::THEME_NAMES;
use egui_sequencer::{
    NoteRecord, ProjectFile, Sequencer, SequencerCommand, SequencerEvent, SequencerOptions, SequencerSnapshot,
};
use rfd::FileDialog;
use std::fs;
use std::path::PathBuf;

const PROJECT_EXTENSION: &str = "seq.json";

fn main() -> eframe::Result<()> {
    env_logger::init();

    let native_options = eframe::NativeOptions::default();
    eframe::run_native(
        "egui Sequencer Example",
        native_options,
        Box::new(|_cc| {
            let app = SequencerApp::new().map_err(|err| err.to_string())?;
            Ok(Box::new(app))
        }),
    )
}

struct SequencerApp {
    sequencer: Sequencer,
    current_path: Option<PathBuf>,
    status_line: String,
    duration_input: String,
}

impl SequencerApp {
    fn new() -> egui_sequencer::SequencerResult<Self> {
        let mut sequencer = Sequencer::new(SequencerOptions::default())?;

        // C major arpeggio
        sequencer.apply_command(SequencerCommand::SetNotes(vec![
            NoteRecord { time: 0.0, pitch: 60, duration: 4.0, velocity: 100 },
            NoteRecord { time: 4.0, pitch: 64, duration: 4.0, velocity: 90 },
            NoteRecord { time: 8.0, pitch: 67, duration: 4.0, velocity: 80 },
            NoteRecord { time: 12.0, pitch: 72, duration: 8.0, velocity: 110 },
        ]))?;
        sequencer.take_events();

        let duration_input = sequencer.display().max_time_range.len().to_string();
        Ok(Self {
            sequencer,
            current_path: None,
            status_line: "Ready".to_owned(),
            duration_input,
        })
    }

    fn menu_bar(&mut self, ui: &mut egui::Ui) {
        egui::menu::bar(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.button("New").clicked() {
                    self.new_project();
                    ui.close_menu();
                }
                if ui.button("Open...").clicked() {
                    self.open_project_dialog();
                    ui.close_menu();
                }
                if ui.button("Save").clicked() {
                    self.save_project();
                    ui.close_menu();
                }
                if ui.button("Save As...").clicked() {
                    self.save_project_as_dialog();
                    ui.close_menu();
                }
                ui.separator();
                if ui.button("Import MIDI...").clicked() {
                    self.import_midi_dialog();
                    ui.close_menu();
                }
                if ui.button("Export MIDI...").clicked() {
                    self.export_midi_dialog();
                    ui.close_menu();
                }
            });

            ui.menu_button("Edit", |ui| {
                if ui.button("Select All").clicked() {
                    self.command(SequencerCommand::SelectAll);
                    ui.close_menu();
                }
                if ui.button("Delete Selection").clicked() {
                    self.command(SequencerCommand::DeleteSelection);
                    ui.close_menu();
                }
                if ui.button("Randomize Notes").clicked() {
                    self.randomize_notes();
                    ui.close_menu();
                }
            });

            ui.menu_button("View", |ui| {
                ui.label("Theme");
                for name in THEME_NAMES {
                    let selected = self.sequencer.theme_name() == name;
                    if ui.radio(selected, name).clicked() {
                        self.command(SequencerCommand::SetTheme(name.to_string()));
                        ui.close_menu();
                    }
                }
                ui.separator();
                ui.label("Quantization");
                let adaptive = self.sequencer.display().adaptive_mode;
                if ui.radio(adaptive, "Adaptive").clicked() {
                    self.command(SequencerCommand::SetAdaptiveMode(true));
                }
                if ui.radio(!adaptive, "Fixed").clicked() {
                    self.command(SequencerCommand::SetAdaptiveMode(false));
                }
                if adaptive {
                    let current = self.sequencer.grid().adaptive_index();
                    for (index, label) in ADAPTIVE_LABELS.iter().enumerate() {
                        if ui.radio(current == index, *label).clicked() {
                            self.command(SequencerCommand::SetAdaptiveIndex(index));
                        }
                    }
                } else {
                    let current = self.sequencer.grid().fixed_index();
                    for (index, label) in FIXED_LABELS.iter().enumerate() {
                        if ui.radio(current == index, *label).clicked() {
                            self.command(SequencerCommand::SetFixedIndex(index));
                        }
                    }
                }
            });

            ui.separator();
            ui.label("Duration");
            let response = ui.add(egui::TextEdit::singleline(&mut self.duration_input).desired_width(48.0));
            if response.lost_focus() {
                self.set_duration();
            }

            if let Some(path) = &self.current_path {
                ui.label(format!(" Project: {}", path.display()));
            } else {
                ui.label(" Project: (unsaved)");
            }
        });
    }

    fn command(&mut self, command: SequencerCommand) {
        if let Err(err) = self.sequencer.apply_command(command) {
            self.set_error(err.to_string());
        }
    }

    fn set_duration(&mut self) {
        match self.sequencer.set_attribute("duration", &self.duration_input) {
            Ok(()) => self.set_status(format!("Duration set to {}", self.duration_input.trim())),
            Err(err) => {
                self.duration_input = self.sequencer.display().max_time_range.len().to_string();
                self.set_error(err.to_string());
            }
        }
    }

    fn randomize_notes(&mut self) {
        let length = self.sequencer.display().max_time_range.len().max(1.0);
        let count = fastrand::usize(4..16);
        let notes = (0..count)
            .map(|_| NoteRecord {
                time: f64::from(fastrand::u32(0..length as u32)),
                pitch: fastrand::u8(58..82),
                duration: f64::from(fastrand::u32(1..5)),
                velocity: fastrand::u8(40..=127),
            })
            .collect();
        self.command(SequencerCommand::SetNotes(notes));
        self.set_status(format!("Generated {count} random notes"));
    }

    fn new_project(&mut self) {
        self.sequencer.load_snapshot(SequencerSnapshot::default());
        self.current_path = None;
        self.duration_input = self.sequencer.display().max_time_range.len().to_string();
        self.set_status("Created new project");
    }

    fn open_project_dialog(&mut self) {
        let Some(path) = FileDialog::new()
            .add_filter("Sequencer Project", &["json"])
            .pick_file()
        else {
            return;
        };
        match ProjectFile::load_from_path(&path) {
            Ok(project) => {
                self.sequencer.load_snapshot(project.snapshot);
                if let Err(err) = self.sequencer.set_theme(&project.theme) {
                    self.set_error(err.to_string());
                }
                self.duration_input = self.sequencer.display().max_time_range.len().to_string();
                self.current_path = Some(path.clone());
                self.set_status(format!("Opened {}", path.display()));
            }
            Err(err) => self.set_error(err.to_string()),
        }
    }

    fn save_project(&mut self) {
        if let Some(path) = self.current_path.clone() {
            self.write_project(path);
        } else {
            self.save_project_as_dialog();
        }
    }

    fn save_project_as_dialog(&mut self) {
        if let Some(path) = FileDialog::new()
            .add_filter("Sequencer Project", &["json"])
            .set_file_name(self.default_file_name(PROJECT_EXTENSION))
            .save_file()
        {
            self.write_project(path);
        }
    }

    fn write_project(&mut self, path: PathBuf) {
        let project = ProjectFile::new(self.sequencer.snapshot(), self.sequencer.theme_name());
        match project.save_to_path(&path) {
            Ok(()) => {
                self.set_status(format!("Saved {}", path.display()));
                self.current_path = Some(path);
            }
            Err(err) => self.set_error(err.to_string()),
        }
    }

    fn import_midi_dialog(&mut self) {
        let Some(path) = FileDialog::new()
            .add_filter("Standard MIDI", &["mid", "midi"])
            .pick_file()
        else {
            return;
        };
        let result = fs::read(&path)
            .map_err(|err| format!("Failed to read {}: {err}", path.display()))
            .and_then(|bytes| self.sequencer.import_midi(&bytes).map_err(|err| err.to_string()));
        match result {
            Ok(()) => {
                self.duration_input = self.sequencer.display().max_time_range.len().to_string();
                self.set_status(format!("Imported {}", path.display()));
            }
            Err(err) => self.set_error(err),
        }
    }

    fn export_midi_dialog(&mut self) {
        let Some(path) = FileDialog::new()
            .add_filter("Standard MIDI", &["mid", "midi"])
            .set_file_name(self.default_file_name("mid"))
            .save_file()
        else {
            return;
        };
        let result = self
            .sequencer
            .export_midi()
            .map_err(|err| format!("Export error: {err}"))
            .and_then(|bytes| fs::write(&path, bytes).map_err(|err| format!("Failed to write {}: {err}", path.display())));
        match result {
            Ok(()) => self.set_status(format!("Exported {}", path.display())),
            Err(err) => self.set_error(err),
        }
    }

    fn default_file_name(&self, extension: &str) -> String {
        self.current_path
            .as_ref()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .map(|name| format!("{}.{extension}", name.trim_end_matches(".seq")))
            .unwrap_or_else(|| format!("project.{extension}"))
    }

    fn set_status<S: Into<String>>(&mut self, msg: S) {
        self.status_line = msg.into();
        log::info!("{}", self.status_line);
    }

    fn set_error<E: Into<String>>(&mut self, err: E) {
        let msg = err.into();
        self.status_line = format!("Error: {msg}");
        log::error!("{msg}");
    }
}

impl eframe::App for SequencerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            self.menu_bar(ui);
        });

        TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(self.status_line.clone());
                ui.separator();
                ui.label(format!(
                    "{} notes, {} selected",
                    self.sequencer.notes().len(),
                    self.sequencer.grid().selection().len()
                ));
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.sequencer.ui(ui);
        });

        for event in self.sequencer.take_events() {
            match &event {
                SequencerEvent::PreviewPitch(Some(pitch)) => log::debug!("preview pitch {pitch}"),
                SequencerEvent::RangesChanged { .. } => log::trace!("[SequencerEvent] {:?}", event),
                _ => log::info!("[SequencerEvent] {:?}", event),
            }
        }
    }
}
