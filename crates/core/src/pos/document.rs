use super::PosError;
use crate::types::{DocumentType, Rut};

/// Check that the buyer data is enough for the requested tax document.
///
/// A boleta can be issued to anyone, including walk-in customers. A
/// factura needs a customer with a RUT and a non-blank business name.
///
/// # Errors
///
/// Returns the first missing requirement for a factura.
pub fn check_document(
    document: DocumentType,
    customer: Option<(Option<&Rut>, Option<&str>)>,
) -> Result<(), PosError> {
    if document == DocumentType::Boleta {
        return Ok(());
    }

    let (rut, business_name) = customer.ok_or(PosError::FacturaRequiresCustomer)?;
    if rut.is_none() {
        return Err(PosError::FacturaRequiresRut);
    }
    if business_name.is_none_or(|n| n.trim().is_empty()) {
        return Err(PosError::FacturaRequiresBusinessName);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_boleta_needs_nothing() {
        assert!(check_document(DocumentType::Boleta, None).is_ok());
    }

    #[test]
    fn test_factura_requirements() {
        let rut = Rut::parse("76.086.428-5").unwrap();

        assert_eq!(
            check_document(DocumentType::Factura, None),
            Err(PosError::FacturaRequiresCustomer)
        );
        assert_eq!(
            check_document(DocumentType::Factura, Some((None, Some("Óptica Sur SpA")))),
            Err(PosError::FacturaRequiresRut)
        );
        assert_eq!(
            check_document(DocumentType::Factura, Some((Some(&rut), Some("  ")))),
            Err(PosError::FacturaRequiresBusinessName)
        );
        assert!(
            check_document(DocumentType::Factura, Some((Some(&rut), Some("Óptica Sur SpA"))))
                .is_ok()
        );
    }
}
