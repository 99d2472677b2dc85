//! Monthly IVA books example

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use iva_ledger::{
    init_logging, BookConfig, Bookkeeper, CompanyInfo, EntityDraft, EntityKind, LineItem,
    PurchaseInput, SaleInput,
};
use std::str::FromStr;

const TEMPLATE: &str = "#== TEMPLATE_START: SALESRECORDS ==#
date,documentType,clientNrc,taxableAmount,exemptAmount,total
Fecha,Tipo Doc,NRC Cliente,Gravada,Exenta,Total
2024-03-18,CF,,0,0,\"1,130.00\"
2024-03-19,CCF,2020-7,250,0,0
";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = BookConfig::from_toml_str("[logging]\nlevel = \"info\"\n")?;
    config.storage.path = std::env::temp_dir().join("iva_ledger_demo.json");
    init_logging(&config.logging)?;

    println!("🧾 IVA Ledger - Monthly Books Example\n");

    let mut book = Bookkeeper::open(config.file_storage()).await?;
    book.reset().await?;

    book.set_company_info(CompanyInfo {
        name: "Ferreteria El Martillo".to_string(),
        nit: "0614-150585-101-2".to_string(),
        nrc: "12345-6".to_string(),
        ..Default::default()
    })
    .await?;

    // 1. Clients and suppliers
    book.add_entity(
        EntityKind::Clients,
        EntityDraft::new("Constructora Lempa", "0614-010101-101-1").nrc("2020-7"),
    )
    .await?;
    book.add_entity(
        EntityKind::Suppliers,
        EntityDraft::new("Cementos del Pacifico", "0614-020202-102-2").nrc("3030-1"),
    )
    .await?;

    // 2. Sales: CCF adds IVA, CF extracts it
    let march = |day| NaiveDate::from_ymd_opt(2024, 3, day).ok_or("invalid date");
    let ccf = book
        .add_sale(
            SaleInput::credit_fiscal(march(4)?, "2020-7", BigDecimal::from(0), BigDecimal::from(0))
                .with_items(vec![
                    LineItem::new(10, "Bolsa de cemento", BigDecimal::from_str("9.50")?),
                    LineItem::new(2, "Varilla 3/8", BigDecimal::from_str("27.50")?),
                ]),
        )
        .await?;
    println!(
        "  ✓ CCF #{}: base ${} + IVA ${} = ${}",
        ccf.correlative, ccf.taxable_amount, ccf.iva_debit, ccf.total
    );

    let cf = book
        .add_sale(SaleInput::final_consumer(march(5)?, BigDecimal::from(113)))
        .await?;
    println!(
        "  ✓ CF #{}: total ${} = base ${} + IVA ${}",
        cf.correlative, cf.total, cf.taxable_amount, cf.iva_debit
    );

    // 3. Purchases
    book.add_purchase(
        PurchaseInput::new(march(2)?, "CCF", "3030-1", "F-0091")
            .taxable_with_credit(BigDecimal::from(400)),
    )
    .await?;

    // 4. Bulk import
    let counts = book.import_bulk_text(TEMPLATE).await?;
    println!(
        "\n📥 Imported {} sales ({} rejected)",
        counts.sales_records, counts.failed
    );

    // 5. Books
    let sales_book = book.sales_book(2024, 3)?;
    println!("\n📊 Libro de Ventas (marzo 2024)");
    for line in &sales_book.credit_fiscal {
        println!(
            "  CCF {:>4}  {}  {:<24} ${:>10}",
            line.correlative, line.date, line.client.name, line.total
        );
    }
    for line in &sales_book.final_consumer {
        println!("  CF  {:>4}  {}  {:<24} ${:>10}", line.correlative, line.date, "", line.total);
    }

    let purchase_book = book.purchase_book(2024, 3)?;
    println!("\n📊 Libro de Compras (marzo 2024)");
    for line in &purchase_book.lines {
        println!(
            "  {:>4}  {}  {:<24} ${:>10}",
            line.correlative, line.date, line.supplier.name, line.total
        );
    }

    let summary = book.vat_summary(2024, 3)?;
    println!("\n💰 IVA del mes");
    println!("  Débito:   ${}", summary.iva_debit);
    println!("  Crédito:  ${}", summary.iva_credit);
    println!("  A pagar:  ${}", summary.payable);
    println!("  Retenido: ${}", summary.iva_withheld);
    println!("  Utilidad: ${}", summary.utility);
    println!(
        "  Ventas {} sin IVA: ${}",
        summary.annual.year, summary.annual.sales_excluding_iva
    );

    // 6. Backups
    let backup = book.export_backup()?;
    println!(
        "\n💾 Text backup: {} lines, JSON backup: {} bytes",
        backup.lines().count(),
        book.export_json()?.len()
    );
    println!("   Stored at {}", config.storage.path.display());

    Ok(())
}
