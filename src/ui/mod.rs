use std::path::PathBuf;

use iced::{
    widget::{button, column, progress_bar, row, scrollable, text, text_input, Space},
    Element, Length,
};

use crate::api::{HistoryEntry, Progress};
use crate::domain::{AppError, JobStatus, MediaFormat};

/// Main view state: one screen, one job at a time.
pub struct DownloadView {
    pub url: String,
    pub format: MediaFormat,
    /// None until settings have loaded; rendered as "Loading...".
    pub save_path: Option<PathBuf>,
    pub progress: Option<Progress>,
    pub history: Vec<HistoryEntry>,
    pub error: Option<String>,
    pub busy: bool,
    pub polling: bool,
}

impl Default for DownloadView {
    fn default() -> Self {
        Self {
            url: String::new(),
            format: MediaFormat::Mp4,
            save_path: None,
            progress: None,
            history: Vec::new(),
            error: None,
            busy: false,
            polling: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    UrlChanged(String),
    FormatPicked(MediaFormat),
    DownloadPressed,
    CancelPressed,
    ChangeFolderPressed,
    OpenFile(String),
    OpenFolder(String),
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::UrlChanged(url) => {
                self.url = url;
            }
            DownloadMessage::FormatPicked(format) => {
                self.format = format;
            }
            _ => {
                // Handled by the app
            }
        }
    }

    pub fn validate_submit(&self) -> Result<(), AppError> {
        if self.url.trim().is_empty() {
            return Err(AppError::EmptyUrl);
        }
        Ok(())
    }

    /// Fold a progress snapshot into the view. Returns true when a
    /// terminal status was observed on this call, which is the one
    /// moment the history list should be refreshed.
    pub fn apply_progress(&mut self, progress: Progress) -> bool {
        if progress.status == JobStatus::Idle {
            return false;
        }

        let terminal = progress.status.is_terminal();
        self.progress = Some(progress);

        if terminal {
            self.busy = false;
            self.stop_polling();
        } else {
            self.busy = true;
        }
        terminal
    }

    /// Idempotent: the poll subscription is keyed off this single flag,
    /// so there is never more than one active timer.
    pub fn start_polling(&mut self) {
        self.polling = true;
    }

    pub fn stop_polling(&mut self) {
        self.polling = false;
    }

    /// Surface an error and halt the current job's busy/polling state.
    pub fn fail(&mut self, message: String) {
        self.error = Some(message);
        self.busy = false;
        self.stop_polling();
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let save_path_label = self
            .save_path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "Loading...".to_string());

        let format_toggle = row![
            button("MP4")
                .on_press_maybe(
                    (!self.busy && self.format != MediaFormat::Mp4)
                        .then_some(DownloadMessage::FormatPicked(MediaFormat::Mp4))
                )
                .padding([5, 15]),
            button("MP3")
                .on_press_maybe(
                    (!self.busy && self.format != MediaFormat::Mp3)
                        .then_some(DownloadMessage::FormatPicked(MediaFormat::Mp3))
                )
                .padding([5, 15]),
        ]
        .spacing(10);

        let percent = self
            .progress
            .as_ref()
            .map(Progress::display_percent)
            .unwrap_or(0.0);
        let status_label = self
            .progress
            .as_ref()
            .map(|progress| progress.status.label())
            .unwrap_or_else(|| JobStatus::Idle.label());

        let mut progress_head = column![text(status_label).size(14)].spacing(2);
        if let Some(name) = self.progress.as_ref().and_then(Progress::display_name) {
            progress_head = progress_head.push(text(name).size(12));
        }

        let mut content = column![
            text("TubeDesk").size(32),
            Space::new().height(Length::Fixed(10.0)),
            text("YouTube URL:").size(16),
            text_input("https://www.youtube.com/watch?v=", &self.url)
                .on_input_maybe((!self.busy).then_some(DownloadMessage::UrlChanged))
                .padding(10),
            format_toggle,
            row![
                column![
                    text("Save to").size(12),
                    text(save_path_label).size(14),
                ]
                .spacing(2),
                Space::new().width(Length::Fill),
                button("Change folder")
                    .on_press_maybe((!self.busy).then_some(DownloadMessage::ChangeFolderPressed))
                    .padding([5, 15]),
            ]
            .spacing(10),
        ]
        .padding(20)
        .spacing(10);

        if let Some(error) = &self.error {
            content = content.push(text(error).size(14).style(text::danger));
        }

        content = content
            .push(
                row![
                    button("Download")
                        .on_press_maybe((!self.busy).then_some(DownloadMessage::DownloadPressed))
                        .padding([10, 20]),
                    button("Cancel")
                        .on_press_maybe(self.busy.then_some(DownloadMessage::CancelPressed))
                        .padding([10, 20]),
                ]
                .spacing(10),
            )
            .push(Space::new().height(Length::Fixed(10.0)))
            .push(
                row![
                    progress_head,
                    Space::new().width(Length::Fill),
                    text(format!("{:.0}%", percent)).size(14),
                ]
                .spacing(10),
            )
            .push(progress_bar(0.0..=100.0, percent))
            .push(Space::new().height(Length::Fixed(10.0)))
            .push(text("Recent history").size(20))
            .push(self.history_list());

        content.into()
    }

    fn history_list(&self) -> Element<'_, DownloadMessage> {
        if self.history.is_empty() {
            return text("No downloads yet.").size(14).into();
        }

        let rows = self
            .history
            .iter()
            .fold(column![].spacing(10), |col, item| col.push(history_row(item)));

        scrollable(rows).height(Length::Fill).into()
    }
}

fn history_row(item: &HistoryEntry) -> Element<'_, DownloadMessage> {
    let meta = format!("{} - {}", item.status.label(), item.format.label());

    let mut info = column![
        text(item.display_name()).size(14),
        text(meta).size(12),
    ]
    .spacing(2);
    if let Some(error) = &item.error {
        info = info.push(text(error).size(12).style(text::danger));
    }

    let mut actions = row![].spacing(5);
    if let Some(path) = item.completed_filepath() {
        actions = actions.push(
            button(text("Open file").size(12))
                .on_press(DownloadMessage::OpenFile(path.to_owned()))
                .padding(5),
        );
        actions = actions.push(
            button(text("Show in folder").size(12))
                .on_press(DownloadMessage::OpenFolder(path.to_owned()))
                .padding(5),
        );
    }

    row![info.width(Length::Fill), actions].spacing(10).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(status: JobStatus, percent: f32) -> Progress {
        Progress {
            status,
            percent,
            ..Progress::default()
        }
    }

    #[test]
    fn terminal_progress_clears_busy_and_stops_polling() {
        let mut view = DownloadView::default();
        view.busy = true;
        view.start_polling();

        let refresh = view.apply_progress(progress(JobStatus::Completed, 100.0));

        assert!(refresh, "terminal status should request a history refresh");
        assert!(!view.busy);
        assert!(!view.polling);
    }

    #[test]
    fn non_terminal_progress_keeps_the_job_busy() {
        let mut view = DownloadView::default();
        view.start_polling();

        let refresh = view.apply_progress(progress(JobStatus::Downloading, 40.0));

        assert!(!refresh);
        assert!(view.busy);
        assert!(view.polling);
    }

    #[test]
    fn idle_progress_is_ignored() {
        let mut view = DownloadView::default();

        let refresh = view.apply_progress(progress(JobStatus::Idle, 0.0));

        assert!(!refresh);
        assert!(view.progress.is_none());
        assert!(!view.busy);
    }

    #[test]
    fn history_refresh_is_requested_exactly_once_per_job() {
        let mut view = DownloadView::default();
        view.start_polling();

        assert!(!view.apply_progress(progress(JobStatus::Downloading, 50.0)));
        assert!(view.apply_progress(progress(JobStatus::Completed, 100.0)));
        // Polling has stopped; a stale tick after the terminal status
        // would be the only way to see another refresh request.
        assert!(!view.polling);
    }

    #[test]
    fn starting_the_poll_loop_is_idempotent() {
        let mut view = DownloadView::default();
        view.start_polling();
        view.start_polling();
        assert!(view.polling);

        view.stop_polling();
        assert!(!view.polling);
    }

    #[test]
    fn blank_url_fails_validation() {
        let mut view = DownloadView::default();
        assert_eq!(view.validate_submit(), Err(AppError::EmptyUrl));

        view.url = "   ".to_string();
        assert_eq!(view.validate_submit(), Err(AppError::EmptyUrl));

        view.url = "https://youtube.com/watch?v=abc".to_string();
        assert_eq!(view.validate_submit(), Ok(()));
    }

    #[test]
    fn failure_clears_busy_and_polling() {
        let mut view = DownloadView::default();
        view.busy = true;
        view.start_polling();

        view.fail("Unable to reach downloader service.".to_string());

        assert_eq!(
            view.error.as_deref(),
            Some("Unable to reach downloader service.")
        );
        assert!(!view.busy);
        assert!(!view.polling);
    }
}
