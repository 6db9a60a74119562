/// Counters accumulated while processing reports.
#[derive(Debug, Default)]
pub struct Stats {
    report_rows: i32,
    rollbacked_rows: i32,
    transactions: i32,
    matched_pairs: i32,
}

impl Stats {
    pub(crate) fn inc_report_row(&mut self) {
        self.report_rows += 1;
    }

    pub(crate) fn inc_rollbacked(&mut self) {
        self.rollbacked_rows += 1;
    }

    pub(crate) fn inc_transactions(&mut self) {
        self.transactions += 1;
    }

    pub(crate) fn set_matched_pairs(&mut self, count: usize) {
        self.matched_pairs = count as i32;
    }

    pub fn pretty_print(&self) {
        println!("{self:#?}");
        println!();
    }
}
