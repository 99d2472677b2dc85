//! Validation utilities

use crate::ledger::purchase::PurchaseInput;
use crate::ledger::sales::{SaleAmounts, SaleInput};
use crate::tax::iva::zero;
use crate::traits::*;
use crate::types::*;

/// Keep only the digits of a phone number; `None` when nothing is left
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    (!digits.is_empty()).then_some(digits)
}

/// Validate a normalized phone number: 7 to 10 digits
pub fn validate_phone(phone: &str) -> LedgerResult<()> {
    if !phone.chars().all(|c| c.is_ascii_digit()) {
        return Err(LedgerError::Validation(
            "Phone number can only contain digits".to_string(),
        ));
    }

    if !(7..=10).contains(&phone.len()) {
        return Err(LedgerError::Validation(
            "Phone number must have between 7 and 10 digits".to_string(),
        ));
    }

    Ok(())
}

/// Trim an optional reference; blank values become `None`
pub fn normalize_optional(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Validate that a text field is not blank
pub fn validate_required(field: &str, value: &str) -> LedgerResult<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::Validation(format!("{} is mandatory", field)));
    }
    Ok(())
}

/// Company data needs at least a name and a NIT
pub fn validate_company_info(info: &CompanyInfo) -> LedgerResult<()> {
    validate_required("Company name", &info.name)?;
    validate_required("Company NIT", &info.nit)?;
    Ok(())
}

/// Enhanced entity validator: the default rules plus a mandatory name
pub struct EnhancedEntityValidator;

impl EntityValidator for EnhancedEntityValidator {
    fn validate_entity(&self, kind: EntityKind, entity: &Entity) -> LedgerResult<()> {
        DefaultEntityValidator.validate_entity(kind, entity)?;
        validate_required("Name", &entity.name)?;
        Ok(())
    }
}

/// Enhanced record validator with the checks the data-entry screens apply
pub struct EnhancedRecordValidator;

impl RecordValidator for EnhancedRecordValidator {
    fn validate_sale(&self, sale: &SaleInput) -> LedgerResult<()> {
        DefaultRecordValidator.validate_sale(sale)?;

        match &sale.amounts {
            SaleAmounts::FinalConsumer { total } if *total <= zero() => Err(
                LedgerError::Validation("CF total must be greater than zero".to_string()),
            ),
            SaleAmounts::CreditFiscal { taxable, exempt }
                if sale.items.is_empty() && taxable + exempt <= zero() =>
            {
                Err(LedgerError::Validation(
                    "CCF must have a taxable or exempt amount".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    fn validate_purchase(&self, purchase: &PurchaseInput) -> LedgerResult<()> {
        DefaultRecordValidator.validate_purchase(purchase)?;
        validate_required("Supplier NRC", &purchase.supplier_nrc)?;
        validate_required("Document number", &purchase.document_number)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_normalization_and_validation() {
        assert_eq!(normalize_phone("(503) 2222-1111"), Some("50322221111".to_string()));
        assert_eq!(normalize_phone(" - "), None);

        assert!(validate_phone("2222111").is_ok());
        assert!(validate_phone("7777888899").is_ok());
        assert!(validate_phone("123456").is_err());
        assert!(validate_phone("50322221111").is_err());
        assert!(validate_phone("22a2111").is_err());
    }

    #[test]
    fn test_optional_normalization() {
        assert_eq!(normalize_optional(Some("  ")), None);
        assert_eq!(normalize_optional(None), None);
        assert_eq!(
            normalize_optional(Some(" 1234-5 ")),
            Some("1234-5".to_string())
        );
    }

    #[test]
    fn test_company_info_requires_name_and_nit() {
        let mut info = CompanyInfo {
            name: "Tienda El Sol".to_string(),
            ..Default::default()
        };
        assert!(validate_company_info(&info).is_err());

        info.nit = "0614-010190-101-1".to_string();
        assert!(validate_company_info(&info).is_ok());
    }
}
