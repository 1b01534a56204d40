use crate::execution::TradeRecord;
use crate::models::{Action, PositionState};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Outcome of a backtest run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub strategy: String,
    pub bars: usize,

    // Portfolio
    pub starting_value: f64,
    pub final_value: f64,
    pub total_return_pct: f64,
    pub final_position: PositionState, // Open positions are marked at the last close

    // Trade Statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub realized_pnl: f64,
    pub commission_paid: f64,

    // One action per bar, in order
    pub actions: Vec<Action>,
    pub trades: Vec<TradeRecord>,
}

impl BacktestReport {
    pub fn new(
        strategy: &str,
        starting_value: f64,
        final_value: f64,
        final_position: PositionState,
        commission_paid: f64,
        actions: Vec<Action>,
        trades: Vec<TradeRecord>,
    ) -> Self {
        let total_trades = trades.len();
        let winning_trades = trades.iter().filter(|t| t.pnl > 0.0).count();
        let losing_trades = total_trades - winning_trades;
        let win_rate = if total_trades > 0 {
            (winning_trades as f64 / total_trades as f64) * 100.0
        } else {
            0.0
        };
        let total_return_pct = if starting_value > 0.0 {
            ((final_value - starting_value) / starting_value) * 100.0
        } else {
            0.0
        };

        Self {
            strategy: strategy.to_string(),
            bars: actions.len(),
            starting_value,
            final_value,
            total_return_pct,
            final_position,
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            realized_pnl: trades.iter().map(|t| t.pnl).sum(),
            commission_paid,
            actions,
            trades,
        }
    }

    /// Count of bars that produced `action`
    pub fn count(&self, action: Action) -> usize {
        self.actions.iter().filter(|a| **a == action).count()
    }

    /// Write a formatted report to `out`
    pub fn print_report<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "\n=== Backtest: {} ({} bars) ===", self.strategy, self.bars)?;
        writeln!(
            out,
            "Return:          {:+.2}% ({:.2} -> {:.2})",
            self.total_return_pct, self.starting_value, self.final_value
        )?;
        writeln!(
            out,
            "Trades:          {} ({} won, {} lost, {:.1}% win rate)",
            self.total_trades, self.winning_trades, self.losing_trades, self.win_rate
        )?;
        writeln!(out, "Realized P&L:    {:.2}", self.realized_pnl)?;
        writeln!(out, "Commission:      {:.2}", self.commission_paid)?;
        writeln!(
            out,
            "Signals:         {} entries, {} exits",
            self.count(Action::EnterLong),
            self.count(Action::ExitLong)
        )?;
        if self.final_position.is_long() {
            writeln!(out, "Position:        still long, marked at last close")?;
        }
        Ok(())
    }
}
