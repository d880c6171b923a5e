use indicatif::{ProgressBar, ProgressBarIter, ProgressIterator, ProgressStyle};

/// Progress bar over an exact-size iterator. `COLOR` is one of `r`, `g`, `b`, `y`, `m`, `c`.
pub struct NiceProgressBar<T: ExactSizeIterator, const COLOR: char = 'b'>(pub T, pub &'static str);

impl<T: ExactSizeIterator, const COLOR: char> NiceProgressBar<T, COLOR> {
    /// Like `into_iter`, but the bar is hidden when `silent` is set.
    pub fn maybe_silent(self, silent: bool) -> ProgressBarIter<T> {
        if silent {
            self.0.progress_with(ProgressBar::hidden())
        } else {
            self.into_iter()
        }
    }
}

impl<T: ExactSizeIterator, const COLOR: char> IntoIterator for NiceProgressBar<T, COLOR> {
    type IntoIter = ProgressBarIter<T>;
    type Item = T::Item;

    fn into_iter(self) -> Self::IntoIter {
        let color = match COLOR {
            'b' => "blue",
            'g' => "green",
            'r' => "red",
            'y' => "yellow",
            'm' => "magenta",
            'c' => "cyan",
            _ => "white",
        };
        let bar = ProgressBar::new(self.0.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(&format!(
                    "{{msg}} [{{elapsed_precise}}] [{{bar:40.{color}/{color}}}] {{pos}}/{{len}} ({{eta}})"
                ))
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_message(self.1);
        self.0.progress_with(bar)
    }
}
