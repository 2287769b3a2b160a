use std::io::Write;

use log::error;

use crate::messages::DisplayState;
use crate::sink::PresentationSink;

const PLACEHOLDER: &str = "--";

/// What the dashboard is showing. `NoData` until the first frame arrives.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Screen {
    #[default]
    NoData,
    Showing(DisplayState),
}

#[derive(Debug, Default)]
pub struct Dashboard {
    screen: Screen,
}

impl Dashboard {
    #[allow(dead_code)]
    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn update(&mut self, state: DisplayState) {
        self.screen = Screen::Showing(state);
    }

    pub fn status(&self) -> &'static str {
        match self.screen {
            Screen::NoData => "waiting for data",
            Screen::Showing(DisplayState::Off) => "sensor off",
            Screen::Showing(DisplayState::Warmup) => "warming up",
            Screen::Showing(DisplayState::Sample { .. }) => "measuring",
        }
    }

    pub fn lines(&self) -> [String; 4] {
        match self.screen {
            Screen::Showing(DisplayState::Sample {
                raw,
                filt,
                flow,
                tds,
            }) => [
                format!("Raw Frequency: {raw:.2} Hz"),
                format!("Filtered Frequency: {filt:.2} Hz"),
                format!("Flow Rate: {flow:.3} L/min"),
                format!("TDS: {tds:.2} ppm"),
            ],
            _ => [
                format!("Raw Frequency: {PLACEHOLDER} Hz"),
                format!("Filtered Frequency: {PLACEHOLDER} Hz"),
                format!("Flow Rate: {PLACEHOLDER} L/min"),
                format!("TDS: {PLACEHOLDER} ppm"),
            ],
        }
    }
}

/// Prints the dashboard to a terminal (or any writer) after every update.
pub struct TextSink<W> {
    dashboard: Dashboard,
    out: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        TextSink {
            dashboard: Dashboard::default(),
            out,
        }
    }

    #[allow(dead_code)]
    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn render(&mut self) -> std::io::Result<()> {
        writeln!(self.out, "[{}]", self.dashboard.status())?;
        for line in self.dashboard.lines() {
            writeln!(self.out, "  {line}")?;
        }
        self.out.flush()
    }

    #[allow(dead_code)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send + 'static> PresentationSink for TextSink<W> {
    fn apply(&mut self, state: DisplayState) {
        self.dashboard.update(state);
        if let Err(err) = self.render() {
            error!("Error rendering dashboard: {:?}", err);
        }
    }
}

/// Writes one JSON object per state, for piping into other tools.
pub struct JsonSink<W> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        JsonSink { out }
    }

    #[allow(dead_code)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_state(&mut self, state: &DisplayState) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.out, state)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send + 'static> PresentationSink for JsonSink<W> {
    fn apply(&mut self, state: DisplayState) {
        if let Err(err) = self.write_state(&state) {
            error!("Error writing {} state as JSON: {:?}", state.label(), err);
        }
    }
}
