//! Text rendering of the volatility chart.
use chain_common::snapshot::{ChartData, Volatilities};
use std::fmt::Write;

const HEADER: &str =
    "  strike   theor |  C last   C bid   C ask |  P last   P bid   P ask";

fn cell(vol: Option<f64>) -> String {
    match vol {
        Some(v) => format!("{:>8.2}", v),
        None => format!("{:>8}", "-"),
    }
}

fn leg(vols: &Volatilities) -> String {
    format!(
        "{}{}{}",
        cell(vols.last_price_volatility),
        cell(vols.bid_volatility),
        cell(vols.ask_volatility)
    )
}

/// One line per ladder strike, volatilities in percent, `-` where unavailable.
pub fn render_chart(chart: &ChartData) -> String {
    let mut out = format!("last price {}\n{}\n", chart.last_price, HEADER);
    for row in &chart.strikes {
        let _ = writeln!(
            out,
            "{:>8}{} |{} |{}",
            row.strike,
            cell(row.volatility),
            leg(&row.call),
            leg(&row.put)
        );
    }
    out
}
