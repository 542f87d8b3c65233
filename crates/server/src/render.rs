use menu_api::nav::{ItemCard, MenuOutcome, MenuView};
use menu_api::orders::DayOrders;
use shared::protocol::{Button, OrderReceipt, RenderPayload, StatsSummary};
use shared::token::{NavState, OrderToken, StatsPeriod, StatsToken};

pub fn render_outcome(outcome: &MenuOutcome) -> RenderPayload {
    match outcome {
        MenuOutcome::View(view) => render_view(view),
        MenuOutcome::OrderPlaced(receipt) => render_receipt(receipt),
    }
}

fn render_view(view: &MenuView) -> RenderPayload {
    match view {
        MenuView::Restaurants { entries } => RenderPayload::screen(
            "Choose a restaurant:",
            rows_of(entries.iter().map(|(name, state)| menu_button(name.as_str(), state)), 2),
        ),
        MenuView::Groups {
            random,
            entries,
            back,
        } => {
            let mut buttons = vec![vec![menu_button("Random from this restaurant", random)]];
            buttons.extend(rows_of(
                entries.iter().map(|(name, state)| menu_button(name.as_str(), state)),
                2,
            ));
            buttons.push(vec![menu_button("Back", back)]);
            RenderPayload::screen("Choose a section:", buttons)
        }
        MenuView::Categories {
            random,
            entries,
            back,
        } => {
            let mut buttons = vec![vec![menu_button("Random pick here", random)]];
            buttons.extend(rows_of(
                entries.iter().map(|(name, state)| menu_button(name.as_str(), state)),
                2,
            ));
            buttons.push(vec![menu_button("Back", back)]);
            RenderPayload::screen("Choose a category:", buttons)
        }
        MenuView::Items {
            random,
            entries,
            back,
        } => {
            let mut buttons = vec![vec![menu_button("Random pick here", random)]];
            for entry in entries {
                let label = format!("{} | {}", entry.name, format_price(entry.price));
                buttons.push(vec![menu_button(label, &entry.state)]);
            }
            buttons.push(vec![menu_button("Back", back)]);
            RenderPayload::screen("Choose a dish:", buttons)
        }
        MenuView::Item(card) => render_item_card(card),
    }
}

fn render_item_card(card: &ItemCard) -> RenderPayload {
    let item = &card.detail.item;
    let mut text = String::new();
    if card.random_pick {
        text.push_str("Random pick!\n");
    }
    text.push_str(&format!(
        "{}\nCategory: {}\n\nWeight: {}\nComposition: {}\nCalories: {} kcal\nP/F/C: {} / {} / {}\n\nPrice: {}",
        item.name,
        card.detail.category_name,
        item.weight,
        item.composition,
        item.calories,
        item.proteins,
        item.fats,
        item.carbohydrates,
        format_price(item.price),
    ));

    let mut buttons = vec![vec![menu_button("Take it (1 pc)", &card.order)]];
    if let Some(reroll) = &card.reroll {
        buttons.push(vec![menu_button("Suggest another", reroll)]);
    }
    buttons.push(vec![menu_button("Back", &card.back)]);
    RenderPayload::screen(text, buttons)
}

fn render_receipt(receipt: &OrderReceipt) -> RenderPayload {
    RenderPayload::notice(format!(
        "Order recorded: {} for {}",
        receipt.item_name,
        format_price(receipt.fixed_price)
    ))
}

pub fn render_day_orders(day: &DayOrders) -> RenderPayload {
    if day.orders.is_empty() {
        return RenderPayload::notice("Nothing ordered today yet");
    }

    let mut text = String::from("Your orders today:\n");
    let mut buttons = Vec::with_capacity(day.orders.len());
    for order in &day.orders {
        let (name, calories) = match &order.item {
            Some(item) => (item.name.as_str(), item.calories),
            None => ("unknown item", 0.0),
        };
        text.push_str(&format!(
            "- {} | {} | {} kcal\n",
            name,
            format_price(order.fixed_price),
            calories
        ));
        buttons.push(vec![Button {
            label: format!("Delete {name}"),
            token: OrderToken::Delete {
                order_id: order.order_id,
            }
            .encode(),
        }]);
    }
    text.push_str(&format!(
        "\nTOTAL: {} | {} kcal",
        format_price(day.total_spend),
        day.total_calories
    ));
    RenderPayload::screen(text, buttons)
}

pub fn render_stats_picker() -> RenderPayload {
    RenderPayload::screen(
        "Choose a report period:",
        vec![vec![
            stats_button("Last week", StatsToken::View(StatsPeriod::Week)),
            stats_button("Last month", StatsToken::View(StatsPeriod::Month)),
            stats_button("All time", StatsToken::View(StatsPeriod::All)),
        ]],
    )
}

pub fn render_stats_summary(period: StatsPeriod, summary: &StatsSummary) -> RenderPayload {
    let text = format!(
        "Report for {}:\n\nOrders: {}\nSpent: {}\nCalories: {} kcal\nAverage per order: {}",
        period_label(period),
        summary.orders,
        format_price(summary.total_spend),
        summary.total_calories,
        summary.average_spend,
    );
    RenderPayload::screen(
        text,
        vec![
            vec![stats_button("Download report", StatsToken::Export(period))],
            vec![stats_button("Back", StatsToken::Picker)],
        ],
    )
}

pub fn render_export_pointer(period: StatsPeriod, external_id: i64) -> RenderPayload {
    let mut payload = RenderPayload::notice("Your report is ready");
    payload.document = Some(format!(
        "/stats/export?external_id={external_id}&period={}",
        period.wire()
    ));
    payload
}

fn period_label(period: StatsPeriod) -> &'static str {
    match period {
        StatsPeriod::Week => "the last week",
        StatsPeriod::Month => "the last month",
        StatsPeriod::All => "all time",
    }
}

fn menu_button(label: impl Into<String>, state: &NavState) -> Button {
    Button {
        label: label.into(),
        token: state.encode(),
    }
}

fn stats_button(label: impl Into<String>, token: StatsToken) -> Button {
    Button {
        label: label.into(),
        token: token.encode(),
    }
}

fn rows_of(buttons: impl Iterator<Item = Button>, per_row: usize) -> Vec<Vec<Button>> {
    let mut rows: Vec<Vec<Button>> = Vec::new();
    for button in buttons {
        match rows.last_mut() {
            Some(row) if row.len() < per_row => row.push(button),
            _ => rows.push(vec![button]),
        }
    }
    rows
}

fn format_price(price: f64) -> String {
    if price.fract().abs() < f64::EPSILON {
        format!("{price:.0}")
    } else {
        format!("{price:.2}")
    }
}
