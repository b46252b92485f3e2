use std::sync::Arc;

use bson::Bson;
use color_eyre::eyre::{Result, eyre};
use unicode_width::UnicodeWidthStr;

use mongomate::{
    browse::{
        BrowseSettings, CollectionContext, Completion, PageSize, PageState, Pager, SortDirection,
        SortSpec, TablePage,
    },
    document::to_pretty_text,
    store::{DocumentStore, Namespace},
};

#[derive(clap::Args, Debug)]
pub struct Args {
    /// Database name
    pub database: String,

    /// Collection name
    pub collection: String,

    /// Filter expression (e.g. `age > 30 AND name begins_with "A"`), an
    /// Extended JSON object, or a bare document id
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Field to sort by
    #[arg(short, long, value_name = "FIELD")]
    pub sort: Option<String>,

    /// Sort descending instead of ascending
    #[arg(long, requires = "sort")]
    pub desc: bool,

    /// Zero-based page number
    #[arg(long, default_value_t = 0)]
    pub page: u64,

    /// Print the documents as relaxed Extended JSON instead of a table
    #[arg(short, long)]
    pub json: bool,
}

pub async fn command(
    store: Arc<dyn DocumentStore>,
    settings: Arc<BrowseSettings>,
    args: Args,
) -> Result<()> {
    let page_size = PageSize::new(settings.page_size)?;
    let namespace = Namespace::new(args.database, args.collection);
    let context = CollectionContext::new(store, namespace, settings);

    let filter_text = args.filter.unwrap_or_default();
    let state = PageState {
        page_index: args.page,
        page_size,
        sort: args.sort.map(|field| SortSpec {
            field,
            direction: if args.desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            },
        }),
        filter: context.filter_predicate(&filter_text)?,
        filter_text,
    };

    let mut pager = Pager::new(state);
    let ticket = pager.load();
    let result = context.fetch_page(&ticket.request).await;
    match pager.complete(ticket.request_id, result) {
        Completion::Applied => {}
        Completion::Failed(err) => return Err(err.into()),
        Completion::Stale => return Err(eyre!("page fetch was superseded")),
    }

    let page = pager.page();
    if args.json {
        let documents = page
            .documents()
            .iter()
            .cloned()
            .map(Bson::Document)
            .collect();
        println!("{}", to_pretty_text(&Bson::Array(documents)));
        return Ok(());
    }
    match empty_notice(page, pager.state()) {
        Some(notice) => eprintln!("{notice}"),
        None => print!("{}", format_table(page)),
    }
    Ok(())
}

/// Same wording as the browser shows for an empty table.
fn empty_notice(page: &TablePage, state: &PageState) -> Option<&'static str> {
    if !page.is_empty() {
        None
    } else if state.page_index > 0 {
        Some("No documents on this page")
    } else {
        Some("No documents")
    }
}

/// Column Set as a header, then one line per document, columns padded to align.
fn format_table(page: &TablePage) -> String {
    if page.is_empty() {
        return String::new();
    }
    let widths: Vec<usize> = page
        .columns
        .iter()
        .enumerate()
        .map(|(index, name)| {
            page.rows
                .iter()
                .map(|row| row.cells[index].text.width())
                .chain(std::iter::once(name.width()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let header = page.columns.iter().map(String::as_str);
    push_line(&mut out, header, &widths);
    for row in &page.rows {
        push_line(&mut out, row.cells.iter().map(|cell| cell.text.as_str()), &widths);
    }
    out
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let mut line = String::new();
    for (text, width) in cells.zip(widths) {
        if !line.is_empty() {
            line.push_str("  ");
        }
        line.push_str(text);
        line.push_str(&" ".repeat(width.saturating_sub(text.width())));
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use mongomate::browse::IdentityResolver;

    use super::*;

    #[test]
    fn table_aligns_columns_and_leaves_gaps_for_missing_fields() {
        let documents = vec![
            doc! { "_id": 1, "name": "Ada", "lang": "en" },
            doc! { "_id": 22, "name": "Grace Hopper" },
        ];
        let page = TablePage::build(documents, &IdentityResolver::default(), 150);
        assert_eq!(
            format_table(&page),
            "_id  lang  name\n\
             1    en    Ada\n\
             22         Grace Hopper\n"
        );
    }

    fn state(page_index: u64) -> PageState {
        PageState {
            page_index,
            page_size: PageSize::new(10).unwrap(),
            sort: None,
            filter: doc! {},
            filter_text: String::new(),
        }
    }

    #[test]
    fn empty_page_gets_a_notice_instead_of_a_table() {
        let page = TablePage::build(Vec::new(), &IdentityResolver::default(), 150);
        assert_eq!(format_table(&page), "");
        assert_eq!(empty_notice(&page, &state(0)), Some("No documents"));
        assert_eq!(
            empty_notice(&page, &state(3)),
            Some("No documents on this page")
        );

        let page = TablePage::build(vec![doc! { "_id": 1 }], &IdentityResolver::default(), 150);
        assert_eq!(empty_notice(&page, &state(0)), None);
    }
}
