//! Language-specific extraction prompts

const DUTCH_PROMPT: &str = "\
Extraheer gestructureerde informatie uit dit Nederlandse aanbestedingsdocument.
Gebruik uitsluitend de volgende velden en neem de tekst zo letterlijk mogelijk over:
- project_title, project_description, project_scope: titel, omschrijving en omvang van de opdracht
- contracting_authority: de aanbestedende dienst
- cpv_codes: elke CPV-code afzonderlijk
- contract_type, contract_duration, payment_terms: soort opdracht, looptijd, betalingsvoorwaarden
- estimated_value, currency: geraamde waarde met valuta
- publication_date, question_deadline, submission_deadline, project_start_date: datums met tijdstip indien vermeld
- knockout_criteria, selection_criteria: elke eis afzonderlijk
- assessment_criteria: elk gunningscriterium als 'naam: weging%'
- contact_persons: naam, functie, e-mail en telefoon per contactpersoon
- deliverables, technical_requirements, compliance_requirements: elk item afzonderlijk
Laat een veld weg als het niet in de tekst voorkomt.";

const ENGLISH_PROMPT: &str = "\
Extract structured information from this tender document.
Use only the following fields and copy the source wording as closely as possible:
- project_title, project_description, project_scope: title, description and scope of the contract
- contracting_authority: the contracting authority
- cpv_codes: each CPV code separately
- contract_type, contract_duration, payment_terms: contract type, duration, payment terms
- estimated_value, currency: estimated value with currency
- publication_date, question_deadline, submission_deadline, project_start_date: dates including time when given
- knockout_criteria, selection_criteria: each requirement separately
- assessment_criteria: each award criterion as 'name: weight%'
- contact_persons: name, role, email and phone per contact
- deliverables, technical_requirements, compliance_requirements: each item separately
Omit a field when the text does not mention it.";

/// Prompt for `language`; languages without a dedicated prompt use English.
pub fn prompt_for_language(language: &str) -> &'static str {
    match language {
        "nl" => DUTCH_PROMPT,
        _ => ENGLISH_PROMPT,
    }
}
