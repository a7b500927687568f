//! Terminal progress bars for isochrone requests.

use catchment_pipeline::{CityProgress, ProgressSink};
use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Draws one bar per city while its isochrones are requested.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct IsochroneBars;

impl CityProgress for IsochroneBars {
    fn for_city(&self, city: &str) -> Box<dyn ProgressSink + '_> {
        Box::new(CityBar(styled(ProgressBar::new(0), city)))
    }
}

fn styled(bar: ProgressBar, city: &str) -> ProgressBar {
    bar.set_style(
        ProgressStyle::default_bar()
            .template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar.set_message(format!("Calculating isochrones for {city}"));
    bar
}

/// One city's bar, sized when the task pool starts.
struct CityBar(ProgressBar);

impl ProgressSink for CityBar {
    fn start(&self, total: usize) {
        self.0.set_length(u64::try_from(total).unwrap_or(u64::MAX));
        self.0.set_position(0);
    }

    fn advance(&self) {
        self.0.inc(1);
    }

    fn finish(&self) {
        self.0.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn bar_names_the_city() {
        let bar = styled(ProgressBar::hidden(), "Heidelberg");

        assert_eq!(bar.message(), "Calculating isochrones for Heidelberg");
    }

    #[rstest]
    fn bar_follows_the_task_pool() {
        let bar = ProgressBar::hidden();
        let sink = CityBar(bar.clone());

        sink.start(3);
        sink.advance();
        sink.advance();

        assert_eq!(bar.length(), Some(3));
        assert_eq!(bar.position(), 2);
        assert!(!bar.is_finished());

        sink.finish();
        assert!(bar.is_finished());
    }
}
