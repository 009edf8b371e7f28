use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use farecast::config::{ServeConfig, DATA_PATH_ENV, DEFAULT_DATA_PATH, DEFAULT_MODEL_PATH, MODEL_PATH_ENV};
use farecast::logging::{init_subscriber, LogTarget, Verbosity};
use farecast::recommend::DEFAULT_TOP_K;
use farecast::{FareError, FareService, ModelStatus, Quote, RawQuery};
use ratatui::{prelude::*, widgets::*};

#[derive(Parser, Debug)]
#[command(name = "farecast", about = "Estimate a flight fare and browse the cheapest stored offers")]
struct Args {
    /// Fitted model artifact written by `model_builder train`.
    #[arg(long, env = MODEL_PATH_ENV, default_value = DEFAULT_MODEL_PATH)]
    model: PathBuf,
    /// Corpus CSV used for recommendations.
    #[arg(long, env = DATA_PATH_ENV, default_value = DEFAULT_DATA_PATH)]
    data: PathBuf,
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,
    /// Append logs to this file. The terminal is taken over by the UI, so
    /// without it logs are dropped.
    #[arg(long)]
    log_file: Option<PathBuf>,
    #[arg(short, long)]
    verbose: bool,
    #[arg(short, long)]
    quiet: bool,
}

// --- App State ---

enum InputMode {
    Normal,
    Editing,
}

#[derive(PartialEq, Debug, Clone, Copy)]
enum FocusedField {
    Origin,
    Destination,
    DaysToDeparture,
    Airline,
    Duration,
    Stops,
}

impl FocusedField {
    const ORDER: [FocusedField; 6] = [
        Self::Origin,
        Self::Destination,
        Self::DaysToDeparture,
        Self::Airline,
        Self::Duration,
        Self::Stops,
    ];

    fn is_selector(self) -> bool {
        matches!(self, Self::Origin | Self::Destination | Self::Airline)
    }

    fn title(self) -> &'static str {
        match self {
            Self::Origin => "Origin (Left/Right)",
            Self::Destination => "Destination (Left/Right)",
            Self::DaysToDeparture => "Days To Departure",
            Self::Airline => "Airline (Left/Right)",
            Self::Duration => "Duration (minutes)",
            Self::Stops => "Stops",
        }
    }
}

/// Cycling choice over a fixed list.
struct Selector {
    options: Vec<String>,
    index: usize,
}

impl Selector {
    fn new(options: Vec<String>, index: usize) -> Self {
        let index = index.min(options.len().saturating_sub(1));
        Self { options, index }
    }

    fn current(&self) -> &str {
        self.options.get(self.index).map(String::as_str).unwrap_or("")
    }

    fn step(&mut self, forward: bool) {
        let len = self.options.len();
        if len == 0 {
            return;
        }
        self.index = if forward {
            (self.index + 1) % len
        } else {
            (self.index + len - 1) % len
        };
    }
}

struct App {
    service: FareService,
    origin: Selector,
    destination: Selector,
    airline: Selector,
    days_to_departure: String,
    duration: String,
    stops: String,
    input_mode: InputMode,
    focused_field: FocusedField,
    notice: Option<String>,
}

impl App {
    fn new(service: FareService) -> App {
        let airports = service.corpus().airports();
        let mut airlines = vec![String::new()];
        airlines.extend(service.corpus().airlines().into_iter().filter(|a| !a.is_empty()));
        App {
            origin: Selector::new(airports.clone(), 0),
            destination: Selector::new(airports, 1),
            airline: Selector::new(airlines, 0),
            days_to_departure: String::from("14"),
            duration: String::new(),
            stops: String::new(),
            input_mode: InputMode::Normal,
            focused_field: FocusedField::Origin,
            notice: None,
            service,
        }
    }

    fn raw_query(&self) -> RawQuery {
        RawQuery {
            origin: Some(self.origin.current().to_string()),
            destination: Some(self.destination.current().to_string()),
            days_to_departure: Some(self.days_to_departure.clone()),
            airline: Some(self.airline.current().to_string()),
            duration: Some(self.duration.clone()),
            stops: Some(self.stops.clone()),
        }
    }

    fn quote(&self) -> Result<Quote, FareError> {
        let query = self.raw_query().parse()?;
        self.service.quote(&query)
    }

    fn text_field(&mut self) -> Option<&mut String> {
        match self.focused_field {
            FocusedField::DaysToDeparture => Some(&mut self.days_to_departure),
            FocusedField::Duration => Some(&mut self.duration),
            FocusedField::Stops => Some(&mut self.stops),
            _ => None,
        }
    }

    fn selector(&mut self) -> Option<&mut Selector> {
        match self.focused_field {
            FocusedField::Origin => Some(&mut self.origin),
            FocusedField::Destination => Some(&mut self.destination),
            FocusedField::Airline => Some(&mut self.airline),
            _ => None,
        }
    }

    fn field_text(&self, field: FocusedField) -> String {
        match field {
            FocusedField::Origin => format!(" < {} > ", self.origin.current()),
            FocusedField::Destination => format!(" < {} > ", self.destination.current()),
            FocusedField::Airline => match self.airline.current() {
                "" => String::from(" < (any) > "),
                name => format!(" < {} > ", name),
            },
            FocusedField::DaysToDeparture => self.days_to_departure.clone(),
            FocusedField::Duration => self.duration.clone(),
            FocusedField::Stops => self.stops.clone(),
        }
    }

    fn next_field(&mut self) {
        let pos = FocusedField::ORDER
            .iter()
            .position(|f| *f == self.focused_field)
            .unwrap_or(0);
        self.focused_field = FocusedField::ORDER[(pos + 1) % FocusedField::ORDER.len()];
    }

    fn prev_field(&mut self) {
        let pos = FocusedField::ORDER
            .iter()
            .position(|f| *f == self.focused_field)
            .unwrap_or(0);
        let len = FocusedField::ORDER.len();
        self.focused_field = FocusedField::ORDER[(pos + len - 1) % len];
    }

    fn reload_model(&mut self) {
        self.notice = Some(match self.service.reload() {
            Ok(()) => String::from("Model reloaded."),
            Err(err) => format!("Reload failed: {err}"),
        });
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let log_target = args.log_file.clone().map_or(LogTarget::Discard, LogTarget::File);
    init_subscriber(Verbosity::from_flags(args.verbose, args.quiet), &log_target)
        .context("opening log file")?;

    let config = ServeConfig {
        model_path: args.model,
        data_path: args.data,
        top_k: args.top_k,
    };
    let service = FareService::initialize(&config)?;

    // Setup Terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run App
    let app = App::new(service);
    let res = run_app(&mut terminal, app);

    // Restore Terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{:?}", err)
    }

    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, &app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match app.input_mode {
                InputMode::Normal => match key.code {
                    KeyCode::Char('q') => return Ok(()),
                    KeyCode::Char('r') => app.reload_model(),
                    KeyCode::Tab | KeyCode::Down => app.next_field(),
                    KeyCode::BackTab | KeyCode::Up => app.prev_field(),
                    KeyCode::Left | KeyCode::Right => {
                        if let Some(selector) = app.selector() {
                            selector.step(key.code == KeyCode::Right);
                        }
                    }
                    KeyCode::Enter => {
                        if app.focused_field.is_selector() {
                            if let Some(selector) = app.selector() {
                                selector.step(true);
                            }
                        } else {
                            app.input_mode = InputMode::Editing;
                        }
                    }
                    _ => {}
                },
                InputMode::Editing => match key.code {
                    KeyCode::Enter | KeyCode::Esc => app.input_mode = InputMode::Normal,
                    KeyCode::Char(c) if c.is_ascii_digit() => {
                        if let Some(text) = app.text_field() {
                            text.push(c);
                        }
                    }
                    KeyCode::Backspace => {
                        if let Some(text) = app.text_field() {
                            text.pop();
                        }
                    }
                    _ => {}
                },
            }
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let mut constraints = vec![Constraint::Length(1)]; // Title
    constraints.extend(FocusedField::ORDER.iter().map(|_| Constraint::Length(3)));
    constraints.push(Constraint::Min(6)); // Result
    constraints.push(Constraint::Length(1)); // Footer

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(constraints)
        .split(f.area());

    let status = match app.service.status() {
        ModelStatus::Ready => Span::styled("model ready", Style::default().fg(Color::Green)),
        ModelStatus::Unavailable { .. } => {
            Span::styled("model unavailable", Style::default().fg(Color::Red))
        }
    };
    let title = Paragraph::new(Line::from(vec![
        Span::styled(
            "Farecast - Fare Estimator  ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        status,
    ]));
    f.render_widget(title, chunks[0]);

    let get_style = |field: FocusedField| {
        if app.focused_field == field {
            match app.input_mode {
                InputMode::Editing => Style::default().fg(Color::Yellow),
                InputMode::Normal => Style::default().fg(Color::Green),
            }
        } else {
            Style::default()
        }
    };

    for (i, field) in FocusedField::ORDER.iter().enumerate() {
        let widget = Paragraph::new(app.field_text(*field))
            .style(get_style(*field))
            .block(Block::default().borders(Borders::ALL).title(field.title()));
        f.render_widget(widget, chunks[i + 1]);
    }

    let result_area = chunks[FocusedField::ORDER.len() + 1];
    match app.quote() {
        Ok(quote) => render_quote(f, result_area, &quote),
        Err(err) => {
            let color = if err.is_client_error() { Color::Yellow } else { Color::Red };
            let widget = Paragraph::new(err.to_string())
                .style(Style::default().fg(color))
                .wrap(Wrap { trim: true })
                .block(Block::default().borders(Borders::ALL).title("Prediction"));
            f.render_widget(widget, result_area);
        }
    }

    let footer_text = app.notice.clone().unwrap_or_else(|| {
        String::from("Press 'q' to quit, 'r' to reload the model. 'Enter' to edit. Up/Down/Tab to navigate.")
    });
    let footer = Paragraph::new(footer_text).style(Style::default().fg(Color::DarkGray));
    f.render_widget(footer, chunks[FocusedField::ORDER.len() + 2]);
}

fn render_quote(f: &mut Frame, area: Rect, quote: &Quote) {
    let header = Row::new(vec!["Price", "Score", "Airline", "Stops", "Duration", "Departs"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let rows = quote.recommendations.iter().map(|rec| {
        Row::new(vec![
            format!("{:.2}", rec.price()),
            format!("{:.2}", rec.score),
            rec.airline().to_string(),
            rec.stops().to_string(),
            format!("{} min", rec.duration()),
            rec.depart_date().map(|d| d.to_string()).unwrap_or_default(),
        ])
    });
    let widths = [
        Constraint::Length(10),
        Constraint::Length(10),
        Constraint::Length(12),
        Constraint::Length(6),
        Constraint::Length(10),
        Constraint::Length(12),
    ];
    let title = if quote.recommendations.is_empty() {
        format!("Predicted {:.2} - no stored offers on this route", quote.predicted_price)
    } else {
        format!("Predicted {:.2} - cheapest offers", quote.predicted_price)
    };
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(table, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use farecast::forest::ForestParams;
    use farecast::{Corpus, FareRecord, FittedPipeline, TripQuery};

    fn record(origin: &str, destination: &str, price: f64) -> FareRecord {
        FareRecord {
            trip: TripQuery {
                origin: origin.into(),
                destination: destination.into(),
                days_to_departure: 14,
                airline: "Delta".into(),
                duration: 180,
                stops: 0,
            },
            depart_date: None,
            price,
        }
    }

    fn app(with_model: bool) -> App {
        let records = vec![record("JFK", "LAX", 300.0), record("JFK", "SFO", 150.0)];
        let pipeline = with_model.then(|| {
            FittedPipeline::fit(
                &records,
                &ForestParams {
                    n_trees: 2,
                    ..ForestParams::default()
                },
            )
        });
        let service = FareService::from_parts(Corpus::new(records), pipeline, &ServeConfig::default());
        App::new(service)
    }

    #[test]
    fn test_app_quotes_selected_route() {
        let app = app(true);
        assert_eq!(app.origin.current(), "JFK");
        assert_eq!(app.destination.current(), "LAX");
        let quote = app.quote().unwrap();
        assert_eq!(quote.recommendations.len(), 1);
        assert_eq!(quote.recommendations[0].price(), 300.0);
    }

    #[test]
    fn test_app_reports_degraded_mode() {
        let app = app(false);
        assert!(matches!(app.quote(), Err(FareError::ModelUnavailable { .. })));
    }

    #[test]
    fn test_app_rejects_blank_days() {
        let mut app = app(true);
        app.days_to_departure.clear();
        let err = app.quote().unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_logs_go_to_file_or_nowhere() {
        let args = Args::parse_from(["farecast"]);
        assert_eq!(args.log_file, None);
        let args = Args::parse_from(["farecast", "--log-file", "run.log", "-v"]);
        assert_eq!(args.log_file, Some(PathBuf::from("run.log")));
        assert!(args.verbose);
    }

    #[test]
    fn test_field_navigation_wraps() {
        let mut app = app(false);
        app.prev_field();
        assert_eq!(app.focused_field, FocusedField::Stops);
        app.next_field();
        assert_eq!(app.focused_field, FocusedField::Origin);
        app.selector().unwrap().step(false);
        assert_eq!(app.origin.current(), "SFO");
    }
}
