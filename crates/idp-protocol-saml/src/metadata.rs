//! IdP metadata publication.
//!
//! Peers learn what this IdP supports from its `EntityDescriptor`: the SSO
//! endpoint for each inbound binding, the signing key, the NameID formats,
//! and, as entity attributes, the entity categories and the supported
//! authentication contexts.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use idp_core::IdpConfig;
use idp_crypto::{KeyMaterial, SigningKey};
use quick_xml::escape::escape;

use crate::nameid::NameIdGeneratorFactory;
use crate::types::{NameIdFormat, SamlBinding, ENTITY_CATEGORY_ATTRIBUTE, MD_NS, SAML_NS, XMLDSIG_NS};
use crate::xml::push_attr;

const MDATTR_NS: &str = "urn:oasis:names:tc:SAML:metadata:attribute";
const ASSURANCE_CERTIFICATION_ATTRIBUTE: &str =
    "urn:oasis:names:tc:SAML:attribute:assurance-certification";
const URI_NAME_FORMAT: &str = "urn:oasis:names:tc:SAML:2.0:attrname-format:uri";

/// Path of the SSO endpoint below the base URL.
pub const SSO_PATH: &str = "/saml/sso";

/// What this IdP publishes about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpMetadataInfo {
    /// The IdP entity ID.
    pub entity_id: String,
    /// Location of the SSO service.
    pub sso_location: String,
    /// Whether the IdP requires signed requests from every peer.
    pub want_authn_requests_signed: bool,
    /// NameID formats the IdP can issue.
    pub name_id_formats: Vec<NameIdFormat>,
    /// Entity categories the IdP declares.
    pub entity_categories: Vec<String>,
    /// Supported authentication context class URIs.
    pub authn_contexts: Vec<String>,
    /// The public part of the IdP signing key.
    pub signing_key: Option<KeyMaterial>,
}

impl IdpMetadataInfo {
    /// Collects the published information.
    #[must_use]
    pub fn new(config: &IdpConfig, name_ids: &NameIdGeneratorFactory, signing_key: &SigningKey) -> Self {
        Self {
            entity_id: config.entity_id.clone(),
            sso_location: format!("{}{SSO_PATH}", config.base_url.trim_end_matches('/')),
            want_authn_requests_signed: config.signature.require_signed_requests,
            name_id_formats: name_ids.supported_formats(),
            entity_categories: config.entity_categories.clone(),
            authn_contexts: config.supported_authn_contexts.clone(),
            signing_key: Some(signing_key.key_material()),
        }
    }

    /// Renders the `EntityDescriptor`.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = format!(
            r#"<md:EntityDescriptor xmlns:md="{MD_NS}" entityID="{}">"#,
            escape(&self.entity_id)
        );

        if !self.entity_categories.is_empty() || !self.authn_contexts.is_empty() {
            out.push_str(&format!(
                r#"<md:Extensions><mdattr:EntityAttributes xmlns:mdattr="{MDATTR_NS}" xmlns:saml="{SAML_NS}">"#
            ));
            push_entity_attribute(&mut out, ENTITY_CATEGORY_ATTRIBUTE, &self.entity_categories);
            push_entity_attribute(&mut out, ASSURANCE_CERTIFICATION_ATTRIBUTE, &self.authn_contexts);
            out.push_str("</mdattr:EntityAttributes></md:Extensions>");
        }

        out.push_str("<md:IDPSSODescriptor");
        if self.want_authn_requests_signed {
            out.push_str(r#" WantAuthnRequestsSigned="true""#);
        }
        out.push_str(r#" protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">"#);

        if let Some(key) = &self.signing_key {
            let encoded = STANDARD.encode(key.der());
            out.push_str(&format!(
                r#"<md:KeyDescriptor use="signing"><ds:KeyInfo xmlns:ds="{XMLDSIG_NS}">"#
            ));
            match key {
                KeyMaterial::Certificate(_) => out.push_str(&format!(
                    "<ds:X509Data><ds:X509Certificate>{encoded}</ds:X509Certificate></ds:X509Data>"
                )),
                KeyMaterial::PublicKey(_) => out.push_str(&format!(
                    "<ds:DEREncodedKeyValue>{encoded}</ds:DEREncodedKeyValue>"
                )),
            }
            out.push_str("</ds:KeyInfo></md:KeyDescriptor>");
        }

        for format in &self.name_id_formats {
            out.push_str(&format!("<md:NameIDFormat>{}</md:NameIDFormat>", format.uri()));
        }
        for binding in [SamlBinding::HttpRedirect, SamlBinding::HttpPost] {
            out.push_str("<md:SingleSignOnService");
            push_attr(&mut out, "Binding", Some(binding.uri()));
            push_attr(&mut out, "Location", Some(&self.sso_location));
            out.push_str("/>");
        }
        out.push_str("</md:IDPSSODescriptor></md:EntityDescriptor>");
        out
    }
}

fn push_entity_attribute(out: &mut String, name: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    out.push_str("<saml:Attribute");
    push_attr(out, "Name", Some(name));
    push_attr(out, "NameFormat", Some(URI_NAME_FORMAT));
    out.push('>');
    for value in values {
        out.push_str(&format!(
            "<saml:AttributeValue>{}</saml:AttributeValue>",
            escape(value)
        ));
    }
    out.push_str("</saml:Attribute>");
}
