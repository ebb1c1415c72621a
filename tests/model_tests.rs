//! Model derivation and DDL emission tests

mod common;

use common::{model_from, CHOICE_XSD, ORDERS_XSD};
use sqlparser::dialect::MsSqlDialect;
use sqlparser::tokenizer::Tokenizer;
use xsd_ingest::ddl::{render_clear_script, render_drop_script, render_schema_script};

#[test]
fn test_minimal_schema_expected_ddl() {
    let model = model_from(ORDERS_XSD);
    let sql = render_schema_script(&model);

    assert!(sql.contains("CREATE TABLE [xsd].[Root]"));
    assert!(sql.contains("CREATE TABLE [xsd].[RootItem]"));
    assert!(sql.contains("UNIQUE ([Id])"));
    assert!(sql.contains("FK_RootItem_Root"));
}

#[test]
fn test_schema_determinism() {
    let first = render_schema_script(&model_from(ORDERS_XSD));
    let second = render_schema_script(&model_from(ORDERS_XSD));
    assert_eq!(first, second, "same XSD must yield byte-identical DDL");

    let drops = render_drop_script(&model_from(ORDERS_XSD));
    assert_eq!(drops, render_drop_script(&model_from(ORDERS_XSD)));
}

#[test]
fn test_pk_fk_invariants_hold_for_every_table() {
    let model = model_from(ORDERS_XSD);
    for table in model.tables() {
        let pks: Vec<_> = table.columns.iter().filter(|c| c.is_primary_key).collect();
        assert_eq!(pks.len(), 1, "{} must have exactly one PK", table.name);
        let pk = pks[0];
        assert_eq!(pk.name, format!("{}Id", table.name));
        assert!(pk.identity);
        assert!(!pk.nullable);
        assert_eq!(
            table.columns[0].name, pk.name,
            "PK must be the first column of {}",
            table.name
        );

        for fk in &table.foreign_keys {
            assert_eq!(fk.column_name, format!("{}Id", fk.ref_table));
            assert_eq!(fk.ref_column, format!("{}Id", fk.ref_table));
            let position = table
                .columns
                .iter()
                .position(|c| c.name == fk.column_name)
                .expect("FK column exists");
            assert_eq!(position, 1, "FK must be the second column of {}", table.name);
        }
    }
}

#[test]
fn test_xs_id_yields_exactly_one_single_column_unique() {
    let model = model_from(ORDERS_XSD);
    let item = model.table("RootItem").expect("RootItem");
    assert_eq!(item.uniques.len(), 1);
    assert_eq!(item.uniques[0].columns, vec!["Id".to_string()]);
}

#[test]
fn test_choice_schema_discriminators() {
    let model = model_from(CHOICE_XSD);
    let sql = render_schema_script(&model);

    let root = model.table("Root").expect("Root");
    let option = root.column("ChoiceOption").expect("ChoiceOption");
    assert!(option.nullable);
    assert!(sql.contains("[ChoiceOption] NVARCHAR(64) NULL"));

    for name in ["RootA", "RootB"] {
        let table = model.table(name).expect(name);
        assert!(table
            .column("ChoiceParentOption")
            .is_some_and(|c| c.nullable));
    }
}

#[test]
fn test_length_facet_on_nullable_column_is_null_wrapped() {
    let model = model_from(
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
             <xs:element name="Rec">
               <xs:complexType>
                 <xs:sequence>
                   <xs:element name="K" minOccurs="0">
                     <xs:simpleType>
                       <xs:restriction base="xs:string">
                         <xs:length value="8"/>
                       </xs:restriction>
                     </xs:simpleType>
                   </xs:element>
                 </xs:sequence>
               </xs:complexType>
             </xs:element>
           </xs:schema>"#,
    );
    let sql = render_schema_script(&model);
    assert!(sql.contains("CHECK ([K] IS NULL OR (LEN([K]) = 8))"));
}

#[test]
fn test_emitted_scripts_lex_under_mssql_dialect() {
    let model = model_from(ORDERS_XSD);
    let dialect = MsSqlDialect {};
    for script in [
        render_schema_script(&model),
        render_drop_script(&model),
        render_clear_script(&model),
    ] {
        let tokens = Tokenizer::new(&dialect, &script).tokenize();
        assert!(tokens.is_ok(), "script must lex cleanly: {:?}", tokens.err());
    }
}
